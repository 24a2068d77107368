// src/system/drain.rs

use crate::invocation::OutputSink;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};

/// Outcome of a single read-and-forward step on one captured channel.
enum Progress {
    /// Bytes were read and forwarded; the channel stays in the active set.
    Read,
    /// End-of-stream; the channel must be closed and removed.
    Eof,
}

/// Drains up to two captured channels until both reach end-of-stream.
///
/// Blocks on poll(2) until at least one channel is readable, reads through
/// the shared scratch buffer, and forwards the bytes verbatim to the
/// channel's sink. End-of-stream on the pipes arrives once the child exits,
/// because the parent holds no write ends (the spawn primitive closed them).
///
/// A hard poll or I/O error terminates draining early; capture is
/// best-effort and the caller still proceeds to reap the child. Closed
/// readers are dropped on every exit path, so no descriptors leak.
pub(crate) fn drain_streams<O, E>(
    mut stdout: Option<(O, OutputSink)>,
    mut stderr: Option<(E, OutputSink)>,
    buf: &mut Vec<u8>,
) where
    O: Read + AsFd,
    E: Read + AsFd,
{
    while stdout.is_some() || stderr.is_some() {
        let ready = wait_readable(
            stdout.as_ref().map(|(reader, _)| reader.as_fd()),
            stderr.as_ref().map(|(reader, _)| reader.as_fd()),
        );
        let (out_ready, err_ready) = match ready {
            Ok(ready) => ready,
            Err(e) => {
                log::error!("Readiness poll failed while draining child output: {e}");
                return;
            }
        };

        if out_ready {
            if let Some((reader, sink)) = stdout.as_mut() {
                match forward_chunk(reader, sink, buf) {
                    Ok(Progress::Read) => {}
                    Ok(Progress::Eof) => stdout = None,
                    Err(e) => {
                        log::error!("Error reading child stdout: {e}");
                        return;
                    }
                }
            }
        }
        if err_ready {
            if let Some((reader, sink)) = stderr.as_mut() {
                match forward_chunk(reader, sink, buf) {
                    Ok(Progress::Read) => {}
                    Ok(Progress::Eof) => stderr = None,
                    Err(e) => {
                        log::error!("Error reading child stderr: {e}");
                        return;
                    }
                }
            }
        }
    }
}

/// Blocks until at least one of the given read ends is ready, reporting
/// readiness per channel. Hangup and error conditions count as readable so
/// the subsequent read can observe end-of-stream instead of spinning.
fn wait_readable(
    out: Option<BorrowedFd<'_>>,
    err: Option<BorrowedFd<'_>>,
) -> io::Result<(bool, bool)> {
    let mut fds = Vec::with_capacity(2);
    let mut out_idx = None;
    let mut err_idx = None;
    if let Some(fd) = out {
        out_idx = Some(fds.len());
        fds.push(PollFd::new(fd, PollFlags::POLLIN));
    }
    if let Some(fd) = err {
        err_idx = Some(fds.len());
        fds.push(PollFd::new(fd, PollFlags::POLLIN));
    }

    match poll(&mut fds, PollTimeout::NONE) {
        Ok(_) => {}
        // Interrupted by a signal: report nothing ready and let the drain
        // loop poll again.
        Err(Errno::EINTR) => return Ok((false, false)),
        Err(e) => return Err(io::Error::from(e)),
    }

    let is_ready = |idx: Option<usize>| {
        idx.and_then(|i| fds.get(i))
            .and_then(|fd| fd.revents())
            .is_some_and(|revents| {
                revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            })
    };
    Ok((is_ready(out_idx), is_ready(err_idx)))
}

/// Reads one chunk from a ready channel and forwards it to the sink.
///
/// A read that fills the scratch buffer exactly signals that larger writes
/// may be queued on the channel, so the buffer doubles before the next read
/// on any channel. The chunk is already flushed to the sink at that point,
/// so the resize does not need to preserve buffer contents.
fn forward_chunk<R: Read>(
    reader: &mut R,
    sink: &OutputSink,
    buf: &mut Vec<u8>,
) -> io::Result<Progress> {
    let n = reader.read(buf.as_mut_slice())?;
    if n == 0 {
        return Ok(Progress::Eof);
    }

    {
        let mut sink = sink
            .lock()
            .map_err(|_| io::Error::other("output sink mutex poisoned"))?;
        sink.write_all(&buf[..n])?;
    }

    if n == buf.len() {
        let doubled = buf.len() * 2;
        log::debug!("Read filled the {}-byte buffer; growing to {doubled}", buf.len());
        buf.resize(doubled, 0);
    }
    Ok(Progress::Read)
}
