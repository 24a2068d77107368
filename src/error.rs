// src/error.rs

use thiserror::Error;

/// Errors surfaced synchronously to the caller before a child is spawned.
///
/// Failures *after* a successful spawn are never reported through this
/// enum: a child that cannot exec its program is only observable through
/// its abnormal exit status, and drain-time I/O errors are logged and
/// non-fatal (best-effort partial capture).
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("No command specified to run.")]
    EmptyInvocation,
    #[error("A previously spawned child (pid {0}) has not been reaped yet.")]
    ChildStillActive(u32),
}
