//! worldsync gateway
//!
//! HTTP routes over the world store, the `/subscribe` WebSocket session
//! protocol, and the client registry that fans updates out to every session.

pub mod control_ui;
pub mod health_api;
pub mod http_api;
pub mod server;
pub mod session_registry;
pub mod ws_protocol;
pub mod ws_server;

pub use server::{GatewayState, build_router, start_server};
pub use session_registry::{ClientRegistry, OutboundMessage, Session, SessionId};
pub use ws_server::{SessionEnd, SessionState, drive_session};
