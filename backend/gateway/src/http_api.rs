//! REST routes over the world store.
//!
//! `PUT` replaces an entity with any JSON value, `POST` merges the fields of
//! a JSON object into it. Neither is broadcast to WebSocket sessions.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use worldsync_core::document::{empty_document, field_count};
use worldsync_core::{Document, World};

use crate::server::GatewayState;

/// An HTTP error rendered as `{"error": {"code": .., "message": ..}}`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.status.as_u16(),
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

/// Decode a request body into a document.
fn parse_body(body: &Bytes) -> Result<Document, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Failed to parse request JSON");
        ApiError::bad_request(e.to_string())
    })
}

/// Decode a request body that must be a JSON object.
fn parse_fields(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    match parse_body(body)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

/// `GET /entity/:entity`
pub async fn get_entity(
    State(state): State<GatewayState>,
    Path(entity): Path<String>,
) -> Json<Document> {
    let document = state.store.get(&entity).await;
    if document == empty_document() {
        warn!(entity = %entity, "Unknown entity, returning empty JSON");
    }
    Json(document)
}

/// `PUT /entity/:entity`
pub async fn put_entity(
    State(state): State<GatewayState>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<Json<Document>, ApiError> {
    let document = parse_body(&body)?;
    debug!(entity = %entity, fields = field_count(&document), "HTTP set");
    state.store.set(&entity, document).await;
    Ok(Json(state.store.get(&entity).await))
}

/// `POST /entity/:entity`
pub async fn post_entity(
    State(state): State<GatewayState>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<Json<Document>, ApiError> {
    let fields = parse_fields(&body)?;
    debug!(entity = %entity, fields = fields.len(), "HTTP merge");
    Ok(Json(state.store.merge_all(&entity, fields).await))
}

/// `GET|POST /world`
pub async fn get_world(State(state): State<GatewayState>) -> Json<World> {
    Json(state.store.world().await)
}

/// `GET|POST /clear`
pub async fn clear_world(State(state): State<GatewayState>) -> Json<World> {
    state.store.clear().await;
    Json(state.store.world().await)
}
