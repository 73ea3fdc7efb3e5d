//! `fieldsync_shared`
//!
//! Shared libraries used by both host and client.
//!
//! Design goals:
//! - One data model (`World` of four `Player` slots) for both roles.
//! - The wire format is plain JSON over WebSocket frames; decoding and validation are separate steps.
//! - GUI concerns stay behind traits (`PositionSource`, `RenderBackend`, `WorldView`).
//! - No `unsafe`.

pub mod codec;
pub mod config;
pub mod frontend;
pub mod input;
pub mod math;
pub mod net;
pub mod render;
pub mod world;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::codec::*;
    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::world::*;
}
