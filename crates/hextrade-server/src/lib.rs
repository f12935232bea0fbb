//! Hextrade multiplayer server.
//!
//! Sessions are keyed by room code. Each runs in its own task that owns the
//! game state; the relay fans accepted events out to every connection.

pub mod config;
pub mod protocol;
pub mod relay;
pub mod sequencer;
pub mod server;
