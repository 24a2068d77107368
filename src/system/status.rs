// src/system/status.rs

use crate::constants::{SIGNAL_STATUS_OFFSET, WAIT_FAILURE_STATUS};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Decodes a reaped wait status into the single-integer exit contract:
/// the raw exit code for a normal exit, `signal + 127` when the child was
/// terminated by a signal, or the failure sentinel when the status carries
/// neither (stopped/continued states never reach this path, since children
/// are reaped only on termination).
pub(crate) fn decode(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    if let Some(signal) = status.signal() {
        return signal + SIGNAL_STATUS_OFFSET;
    }
    log::warn!("Child status {status:?} is neither an exit code nor a signal");
    WAIT_FAILURE_STATUS
}

#[cfg(test)]
mod tests {
    use super::*;

    // Raw wait statuses follow the classic encoding: exit code in the high
    // byte, terminating signal in the low seven bits.
    #[test]
    fn test_normal_exit_yields_raw_code() {
        assert_eq!(decode(ExitStatus::from_raw(0)), 0);
        assert_eq!(decode(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(decode(ExitStatus::from_raw(255 << 8)), 255);
    }

    #[test]
    fn test_signal_termination_yields_offset_signal() {
        assert_eq!(decode(ExitStatus::from_raw(9)), 9 + SIGNAL_STATUS_OFFSET);
        assert_eq!(decode(ExitStatus::from_raw(15)), 15 + SIGNAL_STATUS_OFFSET);
    }
}
