//! The pure client<->upstream protocol mapping. Every function here
//! takes the relevant piece of state as an argument and returns data;
//! none of them perform I/O or hold a lock. The session applies
//! whatever these return.

pub mod from_upstream;
pub mod to_upstream;

pub use from_upstream::ResponseTrackingState;
pub use to_upstream::SessionConfig;
