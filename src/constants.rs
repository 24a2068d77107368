// src/constants.rs

/// Initial capacity of the scratch buffer used while draining captured
/// output. The buffer doubles every time a single read fills it exactly.
pub const INITIAL_READ_BUFFER_SIZE: usize = 1024;

/// Status reported when the child could not be spawned at all (executable
/// not found or not executable). Equivalent to a child calling `exit(-1)`
/// as observed through wait(2).
pub const SPAWN_FAILURE_STATUS: i32 = 255;

/// Sentinel returned by a background-mode `run`: the child was spawned but
/// its output has not been drained and its status has not been reaped.
pub const STATUS_SPAWNED: i32 = 0;

/// Sentinel status for an unrecoverable wait failure, or for `wait` called
/// with no tracked child.
pub const WAIT_FAILURE_STATUS: i32 = -1;

/// Offset added to the terminating signal number when a child is killed by
/// a signal, so `SIGKILL` (9) reports as 136 and `SIGTERM` (15) as 142.
pub const SIGNAL_STATUS_OFFSET: i32 = 127;
