//! `worldsync-core`: the shared world store and its notification hub.

pub mod document;
pub mod error;
pub mod hub;
pub mod store;

pub use document::{Document, World};
pub use error::{ProtocolError, WorldError};
pub use hub::{NotificationHub, Observer};
pub use store::WorldStore;
