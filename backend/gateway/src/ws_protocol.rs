//! WebSocket protocol for the `/subscribe` endpoint.
//!
//! Inbound frames carry exactly one entity: `{"<entity>": <document>}`, where
//! the document is any JSON value, usually an object.
//! Outbound frames are either the world snapshot or a verbatim copy of an
//! inbound frame that was applied.

use axum::extract::ws::Message;
use serde_json::Value;

use worldsync_core::{Document, ProtocolError};

/// A parsed inbound update: replace `entity`'s document with `document`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub entity: String,
    pub document: Document,
}

impl EntityUpdate {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        let Value::Object(packet) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        if packet.len() != 1 {
            return Err(ProtocolError::EntityCount(packet.len()));
        }
        let Some((entity, document)) = packet.into_iter().next() else {
            return Err(ProtocolError::EntityCount(0));
        };
        Ok(Self { entity, document })
    }
}

/// What the reader loop should do with one received frame.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// Candidate update text, to be parsed and re-broadcast verbatim.
    Update(String),
    /// Binary frame that is not valid UTF-8.
    Undecodable,
    /// Control frames answered by the transport.
    Ignored,
    Close,
}

impl From<Message> for Inbound {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Inbound::Update(text),
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Inbound::Update(text),
                Err(_) => Inbound::Undecodable,
            },
            Message::Ping(_) | Message::Pong(_) => Inbound::Ignored,
            Message::Close(_) => Inbound::Close,
        }
    }
}
