//! World Event Logger
//!
//! Structured store events written through `tracing` on the `world_events`
//! target, so they land in the NDJSON file alongside everything else.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use worldsync_core::document::field_count;
use worldsync_core::{Document, Observer};

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum WorldEvent {
    EntityUpdated {
        entity: String,
        fields: usize,
        bytes: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: WorldEvent,
}

/// Observer that records every store notification.
#[derive(Debug, Default)]
pub struct MutationLogger;

impl MutationLogger {
    pub fn new() -> Self {
        Self
    }

    /// Summarize one notification without logging document contents.
    pub fn describe(entity: &str, document: &Document) -> Result<WorldEvent> {
        let bytes = serde_json::to_vec(document)?.len();
        Ok(WorldEvent::EntityUpdated {
            entity: entity.to_string(),
            fields: field_count(document),
            bytes,
        })
    }
}

impl Observer for MutationLogger {
    fn name(&self) -> &str {
        "mutation_logger"
    }

    fn on_update(&self, entity: &str, document: &Document) -> Result<()> {
        let entry = EventLogEntry {
            timestamp: Utc::now(),
            event: Self::describe(entity, document)?,
        };
        info!(target: "world_events", event = ?entry, "World event");
        Ok(())
    }
}
