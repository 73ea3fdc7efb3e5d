//! `fieldsync_host`
//!
//! Host-side systems:
//! - World authority task owning the canonical `World`
//! - Accept loop, one task per WebSocket connection
//! - Per-connection request/response: player update in, merged world out

pub mod authority;
pub mod server;

pub use authority::{WorldAuthority, WorldHandle};
pub use server::HostServer;
