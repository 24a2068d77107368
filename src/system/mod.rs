//! # System Interaction Layer
//!
//! This module is the boundary between the `Invocation` entity and the
//! operating system's process and pipe primitives.
//!
//! ## Modules
//!
//! - **`drain`**: the I/O-multiplexing core. Polls up to two captured pipe
//!   read ends for readiness, reads through an adaptive scratch buffer, and
//!   forwards the bytes verbatim to caller-owned sinks until end-of-stream.
//! - **`status`**: decodes a child's wait status into the single-integer
//!   contract (raw exit code, `signal + 127`, or the `-1` failure sentinel).

pub mod drain;
pub mod status;
