//! `fieldsync_client`
//!
//! Client-side systems:
//! - Connection to the host (one WebSocket, no reconnect)
//! - Fixed-rate sync loop with an explicit connection state machine
//! - Local world replica shared with the frontend loop

pub mod client;

pub use client::{ClientState, SyncClient};
