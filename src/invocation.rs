// src/invocation.rs

use crate::constants::{
    INITIAL_READ_BUFFER_SIZE, SPAWN_FAILURE_STATUS, STATUS_SPAWNED, WAIT_FAILURE_STATUS,
};
use crate::error::InvocationError;
use crate::system::{drain, status};
use std::fmt;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};

/// Caller-owned destination for captured output bytes. The caller keeps a
/// clone of the `Arc` and can inspect the sink after the run; the engine
/// locks it only for the duration of each forwarded chunk.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// Disposition of one of the child's standard output channels.
enum ChannelConfig {
    /// Channel is inherited unmodified from the parent (the default).
    Inherit,
    /// Channel output is discarded.
    Silence,
    /// Channel output is forwarded verbatim to a caller-owned sink.
    Capture(OutputSink),
}

impl ChannelConfig {
    fn as_stdio(&self) -> Stdio {
        match self {
            Self::Inherit => Stdio::inherit(),
            Self::Silence => Stdio::null(),
            Self::Capture(_) => Stdio::piped(),
        }
    }

    fn sink(&self) -> Option<&OutputSink> {
        match self {
            Self::Capture(sink) => Some(sink),
            _ => None,
        }
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => f.write_str("Inherit"),
            Self::Silence => f.write_str("Silence"),
            Self::Capture(_) => f.write_str("Capture(..)"),
        }
    }
}

/// A mutable, reusable external-program invocation.
///
/// Accumulates an argument vector (see [`Invocation::arg`]), spawns the
/// program as a child process with per-channel output disposition, and
/// reports the decoded termination status. At most one child is tracked at
/// a time; an `Invocation` may be reused for sequential spawns.
#[derive(Debug)]
pub struct Invocation {
    /// Ordered tokens; index 0 is the executable path or name. Mutated only
    /// by the builder and by `clear`, never by the engine.
    args: Vec<String>,
    stdout: ChannelConfig,
    stderr: ChannelConfig,
    /// Most recently spawned child, valid between spawn and reap.
    child: Option<Child>,
    /// Background mode: the caller polls and reaps later. Persists across
    /// runs until `clear`.
    background: bool,
    /// Scratch buffer for draining captured output; grows adaptively and is
    /// reused across runs.
    read_buf: Vec<u8>,
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

impl Invocation {
    /// Creates an invocation with no arguments, both channels inherited,
    /// and synchronous execution mode.
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            stdout: ChannelConfig::Inherit,
            stderr: ChannelConfig::Inherit,
            child: None,
            background: false,
            read_buf: vec![0; INITIAL_READ_BUFFER_SIZE],
        }
    }

    pub(crate) fn push_token(&mut self, token: String) {
        self.args.push(token);
    }

    /// The accumulated argument vector, in order.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Empties the argument vector and resets execution mode to
    /// synchronous. Channel dispositions (silencing and capture sinks) and
    /// the internal read buffer persist across `clear`, so a reconfigured
    /// reuse only needs new arguments.
    pub fn clear(&mut self) {
        self.args.clear();
        self.background = false;
    }

    /// Discards the child's stdout, dropping any previously set sink.
    pub fn silence_stdout(&mut self) {
        self.stdout = ChannelConfig::Silence;
    }

    /// Discards the child's stderr, dropping any previously set sink.
    pub fn silence_stderr(&mut self) {
        self.stderr = ChannelConfig::Silence;
    }

    /// Discards both output channels.
    pub fn silence(&mut self) {
        self.silence_stdout();
        self.silence_stderr();
    }

    /// Forwards the child's stdout to `sink`, clearing any prior silencing.
    pub fn capture_stdout<W>(&mut self, sink: Arc<Mutex<W>>)
    where
        W: Write + Send + 'static,
    {
        self.stdout = ChannelConfig::Capture(sink);
    }

    /// Forwards the child's stderr to `sink`, clearing any prior silencing.
    pub fn capture_stderr<W>(&mut self, sink: Arc<Mutex<W>>)
    where
        W: Write + Send + 'static,
    {
        self.stderr = ChannelConfig::Capture(sink);
    }

    /// Spawns the program and, in synchronous mode, drains captured output
    /// and reaps the child, returning its decoded exit status (raw code,
    /// `signal + 127`, or `-1` on a wait failure).
    ///
    /// In background mode (see [`Invocation::run_background`]) this returns
    /// immediately after the spawn with [`STATUS_SPAWNED`]; the caller is
    /// then responsible for [`Invocation::is_running`] /
    /// [`Invocation::wait`].
    ///
    /// A program that cannot be executed at all is not an error from the
    /// parent's point of view: a diagnostic goes to the stderr sink when
    /// one is configured, and the call yields [`SPAWN_FAILURE_STATUS`].
    ///
    /// # Errors
    ///
    /// [`InvocationError::EmptyInvocation`] when no arguments were built,
    /// and [`InvocationError::ChildStillActive`] when the previous child
    /// has not been reaped yet.
    pub fn run(&mut self) -> Result<i32, InvocationError> {
        let Some((program, rest)) = self.args.split_first() else {
            return Err(InvocationError::EmptyInvocation);
        };
        if let Some(child) = &self.child {
            return Err(InvocationError::ChildStillActive(child.id()));
        }

        log::debug!("Spawning: {self}");
        let mut command = Command::new(program);
        command
            .args(rest)
            .stdout(self.stdout.as_stdio())
            .stderr(self.stderr.as_stdio());

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                // Mirrors an exec failure inside a forked child: the parent
                // observes only a diagnostic on the error channel and an
                // abnormal exit status, never a distinct error value.
                log::error!("Failed to spawn '{program}': {e}");
                if let Some(sink) = self.stderr.sink() {
                    if let Ok(mut sink) = sink.lock() {
                        let _ = writeln!(sink, "{program}: {e}");
                    }
                }
                return Ok(SPAWN_FAILURE_STATUS);
            }
        };
        self.child = Some(child);

        if self.background {
            return Ok(STATUS_SPAWNED);
        }
        Ok(self.wait())
    }

    /// Spawns the program fire-and-forget: returns as soon as the child is
    /// running, leaving polling and reaping to the caller. Background mode
    /// stays set for subsequent runs until [`Invocation::clear`].
    ///
    /// # Errors
    ///
    /// Same as [`Invocation::run`].
    pub fn run_background(&mut self) -> Result<(), InvocationError> {
        self.background = true;
        self.run().map(|_| ())
    }

    /// Non-blocking liveness check of the tracked child. Returns `false`
    /// when no child is tracked or the child has terminated.
    ///
    /// Checking never changes the outcome of a later [`Invocation::wait`]:
    /// if the child has already exited its status is retained for the
    /// subsequent reap.
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                log::warn!("Failed to poll child {}: {e}", child.id());
                false
            }
        }
    }

    /// Blocks until the tracked child terminates and returns its decoded
    /// status: the raw exit code for a normal exit, `signal + 127` for a
    /// signal termination, or `-1` when the wait fails or no child is
    /// tracked. Any output still pending on captured pipes (a background
    /// run) is drained first; end-of-stream arrives once the child exits,
    /// and draining before reaping keeps the child from stalling on a full
    /// pipe.
    ///
    /// The reap targets the tracked child specifically, so concurrently
    /// running `Invocation`s never consume each other's statuses.
    pub fn wait(&mut self) -> i32 {
        let Some(mut child) = self.child.take() else {
            log::warn!("wait() called with no tracked child");
            return WAIT_FAILURE_STATUS;
        };

        let stdout = child
            .stdout
            .take()
            .and_then(|reader| Some((reader, Arc::clone(self.stdout.sink()?))));
        let stderr = child
            .stderr
            .take()
            .and_then(|reader| Some((reader, Arc::clone(self.stderr.sink()?))));
        if stdout.is_some() || stderr.is_some() {
            drain::drain_streams(stdout, stderr, &mut self.read_buf);
        }

        match child.wait() {
            Ok(exit) => {
                let decoded = status::decode(exit);
                log::debug!("Child {} finished with status {decoded}", child.id());
                decoded
            }
            Err(e) => {
                log::error!("Failed to wait on child {}: {e}", child.id());
                WAIT_FAILURE_STATUS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SPAWN_FAILURE_STATUS;
    use std::io::Write as _;
    use std::os::unix::fs::PermissionsExt;
    use std::thread;
    use std::time::Duration;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn capture_buffer() -> Arc<Mutex<Vec<u8>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_run_without_arguments_fails_fast() {
        let mut cmd = Invocation::new();
        assert!(matches!(cmd.run(), Err(InvocationError::EmptyInvocation)));
    }

    #[test]
    fn test_echo_with_captured_stdout() {
        init_logs();
        let out = capture_buffer();
        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        cmd.arg("echo").arg("hello");

        assert_eq!(cmd.run().unwrap(), 0);
        assert_eq!(out.lock().unwrap().as_slice(), b"hello\n");
    }

    #[test]
    fn test_both_channels_captured_independently() {
        init_logs();
        let out = capture_buffer();
        let err = capture_buffer();
        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        cmd.capture_stderr(err.clone());
        cmd.arg("/bin/sh").arg("-c").arg("echo visible; echo oops 1>&2");

        assert_eq!(cmd.run().unwrap(), 0);
        assert_eq!(out.lock().unwrap().as_slice(), b"visible\n");
        assert_eq!(err.lock().unwrap().as_slice(), b"oops\n");
    }

    #[test]
    fn test_nonexistent_executable_yields_abnormal_status() {
        init_logs();
        let out = capture_buffer();
        let err = capture_buffer();
        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        cmd.capture_stderr(err.clone());
        cmd.arg("definitely-not-a-real-binary-4f2a");

        assert_eq!(cmd.run().unwrap(), SPAWN_FAILURE_STATUS);
        assert!(out.lock().unwrap().is_empty());
        let diagnostic = String::from_utf8(err.lock().unwrap().clone()).unwrap();
        assert!(diagnostic.contains("definitely-not-a-real-binary-4f2a"));
        // No child was created, so nothing is left to reap.
        assert!(!cmd.is_running());
    }

    #[test]
    fn test_silencing_overrides_a_previous_sink() {
        init_logs();
        let out = capture_buffer();
        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        cmd.silence_stdout();
        cmd.arg("echo").arg("noisy output nobody wants");

        assert_eq!(cmd.run().unwrap(), 0);
        assert!(out.lock().unwrap().is_empty());
    }

    #[test]
    fn test_large_output_survives_buffer_growth_intact() {
        init_logs();
        let out = capture_buffer();
        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        // Well past the initial buffer size, forcing several growth events.
        cmd.arg("/bin/sh").arg("-c").arg("seq 1 20000");

        assert_eq!(cmd.run().unwrap(), 0);
        let expected: Vec<u8> = (1..=20000u32)
            .flat_map(|i| format!("{i}\n").into_bytes())
            .collect();
        assert_eq!(*out.lock().unwrap(), expected);
    }

    #[test]
    fn test_signal_termination_reports_offset_status() {
        init_logs();
        let mut cmd = Invocation::new();
        cmd.silence();
        cmd.arg("/bin/sh").arg("-c").arg("kill -9 $$");

        // SIGKILL is 9, reported as 9 + 127.
        assert_eq!(cmd.run().unwrap(), 136);
    }

    #[test]
    fn test_clear_drops_arguments_but_keeps_sinks() {
        init_logs();
        let out = capture_buffer();
        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        cmd.arg("echo").arg("first");
        assert_eq!(cmd.run().unwrap(), 0);

        cmd.clear();
        assert!(matches!(cmd.run(), Err(InvocationError::EmptyInvocation)));

        cmd.arg("echo").arg("second");
        assert_eq!(cmd.run().unwrap(), 0);
        assert_eq!(out.lock().unwrap().as_slice(), b"first\nsecond\n");
    }

    #[test]
    fn test_background_run_polls_and_reaps_explicitly() {
        init_logs();
        let mut cmd = Invocation::new();
        cmd.arg("/bin/sh").arg("-c").arg("sleep 0.5");
        cmd.run_background().unwrap();

        assert!(cmd.is_running());
        // Liveness polling, however often, must not disturb the reap.
        while cmd.is_running() {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(cmd.wait(), 0);
        assert!(!cmd.is_running());
    }

    #[test]
    fn test_background_capture_is_drained_by_wait() {
        init_logs();
        let out = capture_buffer();
        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        cmd.arg("/bin/sh").arg("-c").arg("sleep 0.1; echo done");
        cmd.run_background().unwrap();

        assert_eq!(cmd.wait(), 0);
        assert_eq!(out.lock().unwrap().as_slice(), b"done\n");
    }

    #[test]
    fn test_spawn_is_rejected_while_child_is_unreaped() {
        init_logs();
        let mut cmd = Invocation::new();
        cmd.arg("sleep").arg("0.3");
        cmd.run_background().unwrap();

        assert!(matches!(
            cmd.run(),
            Err(InvocationError::ChildStillActive(_))
        ));
        assert_eq!(cmd.wait(), 0);
    }

    #[test]
    fn test_wait_without_child_returns_sentinel() {
        let mut cmd = Invocation::new();
        assert_eq!(cmd.wait(), WAIT_FAILURE_STATUS);
    }

    #[test]
    fn test_nonzero_exit_code_from_script_fixture() {
        init_logs();
        let out = capture_buffer();
        let err = capture_buffer();

        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(script, "#!/bin/sh\necho to-out\necho to-err 1>&2\nexit 7").unwrap();
        let mut perms = script.as_file().metadata().unwrap().permissions();
        perms.set_mode(0o755);
        script.as_file().set_permissions(perms).unwrap();
        // Close the write handle before executing, or exec hits ETXTBSY.
        let path = script.into_temp_path();

        let mut cmd = Invocation::new();
        cmd.capture_stdout(out.clone());
        cmd.capture_stderr(err.clone());
        cmd.arg(&*path);

        assert_eq!(cmd.run().unwrap(), 7);
        assert_eq!(out.lock().unwrap().as_slice(), b"to-out\n");
        assert_eq!(err.lock().unwrap().as_slice(), b"to-err\n");
    }

    #[test]
    fn test_sequential_reuse_tracks_one_child_at_a_time() {
        init_logs();
        let mut cmd = Invocation::new();
        cmd.silence();
        for _ in 0..3 {
            cmd.clear();
            cmd.arg("echo").arg("again");
            assert_eq!(cmd.run().unwrap(), 0);
        }
    }
}
