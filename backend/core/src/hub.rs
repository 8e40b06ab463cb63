//! Notification hub.
//!
//! Observers are plain synchronous callbacks invoked with the entity name and
//! its full post-mutation document. They run in registration order. A failing
//! observer is logged and skipped; it never undoes the mutation or stops the
//! observers after it.

use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document::Document;

// ---------------------------------------------------------------------------
// Observer trait
// ---------------------------------------------------------------------------

/// Receives a notification after every `set` or `merge`.
///
/// Called while the store's write lock is held: implementations must not block
/// and must not call back into the store.
pub trait Observer: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "anonymous"
    }

    fn on_update(&self, entity: &str, document: &Document) -> Result<()>;
}

impl<F> Observer for F
where
    F: Fn(&str, &Document) -> Result<()> + Send + Sync,
{
    fn on_update(&self, entity: &str, document: &Document) -> Result<()> {
        self(entity, document)
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Ordered list of registered observers.
#[derive(Default, Clone)]
pub struct NotificationHub {
    observers: Arc<RwLock<Vec<Arc<dyn Observer>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer. It sees every mutation from now on.
    pub async fn register(&self, observer: Arc<dyn Observer>) {
        let mut list = self.observers.write().await;
        debug!(observer = observer.name(), position = list.len(), "Registered observer");
        list.push(observer);
    }

    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.observers.read().await.is_empty()
    }

    /// Invoke every observer in registration order.
    ///
    /// Returns how many observers failed (returned `Err` or panicked).
    pub async fn notify(&self, entity: &str, document: &Document) -> usize {
        let list = self.observers.read().await;
        let mut failures = 0;
        for observer in list.iter() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_update(entity, document))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(observer = observer.name(), entity, error = %e, "Observer failed");
                }
                Err(_) => {
                    failures += 1;
                    warn!(observer = observer.name(), entity, "Observer panicked");
                }
            }
        }
        failures
    }
}
