//! Realtime voice-agent protocol translation proxy.
//!
//! Terminates a client WebSocket speaking the Agent protocol, opens a
//! matched upstream WebSocket speaking the Realtime protocol, and
//! bidirectionally translates messages between them. See `SPEC_FULL.md`
//! at the workspace root for the full design.
//!
//! - `config`: process configuration loaded from the environment.
//! - `error`: the session/translator error taxonomy.
//! - `protocol`: the client-facing Agent protocol message types.
//! - `upstream`: the Realtime protocol event types spoken to the provider.
//! - `audio`: binary audio frame buffering and debounced commit.
//! - `translator`: the pure client<->upstream mapping functions.
//! - `session`: the per-connection state machine and listener wiring.

pub mod audio;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod translator;
pub mod upstream;

pub use session::ws_handler;
