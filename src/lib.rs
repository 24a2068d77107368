//! # invoker
//!
//! A small engine for invoking external programs: build an argument vector
//! incrementally from heterogeneous values, spawn the program as a child
//! process, optionally capture its stdout/stderr into caller-owned sinks,
//! and decode its termination status.
//!
//! The central entity is [`Invocation`], which is mutable and reusable:
//!
//! ```no_run
//! use invoker::Invocation;
//! use std::sync::{Arc, Mutex};
//!
//! # fn main() -> Result<(), invoker::InvocationError> {
//! let output: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
//!
//! let mut cmd = Invocation::new();
//! cmd.capture_stdout(output.clone());
//! cmd.arg("echo").arg("hello");
//!
//! let status = cmd.run()?;
//! assert_eq!(status, 0);
//! # Ok(())
//! # }
//! ```
//!
//! Unix only: draining relies on poll(2) over pipe file descriptors, and
//! status decoding follows the Unix wait(2) conventions.

pub mod args;
pub mod constants;
pub mod error;
pub mod invocation;
pub mod system;

pub use args::ToArg;
pub use error::InvocationError;
pub use invocation::{Invocation, OutputSink};
