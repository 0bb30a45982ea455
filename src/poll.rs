//! Readiness polling and non-blocking reads over the platform I/O layer.
//!
//! The multiplexer only talks to the [`Readiness`] trait, so the polling
//! primitive can be swapped (e.g. for an edge-triggered event queue) without
//! touching how lines are split and flushed.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

/// Result of a single non-blocking read attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// This many bytes were placed at the front of the buffer.
    Data(usize),
    /// No data right now; try again after the next poll.
    WouldBlock,
    /// The source reached end-of-stream.
    Closed,
}

/// Capability to wait for, and read from, a set of non-blocking handles.
pub trait Readiness {
    type Handle: Send;

    /// Waits at most `timeout` for any of `handles` to become readable and
    /// returns the indices of those that are, in ascending order.
    ///
    /// An empty result means nothing was ready in time.
    fn poll(&mut self, handles: &[&Self::Handle], timeout: Duration) -> io::Result<Vec<usize>>;

    /// Reads up to `buf.len()` bytes without blocking.
    fn try_read(&mut self, handle: &mut Self::Handle, buf: &mut [u8]) -> io::Result<ReadOutcome>;
}

/// An open file or FIFO whose descriptor has `O_NONBLOCK` set.
#[derive(Debug)]
pub struct NonBlockingFile {
    file: File,
}

impl NonBlockingFile {
    /// Switches `file` to non-blocking reads and wraps it.
    pub fn new(file: File) -> io::Result<Self> {
        set_nonblocking(file.as_raw_fd())?;
        Ok(NonBlockingFile { file })
    }
}

impl AsRawFd for NonBlockingFile {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// [`Readiness`] backed by `poll(2)`.
///
/// Regular files always report readable, which suits them: a read either
/// returns data or end-of-stream.
#[derive(Default)]
pub struct PollReadiness {
    fds: Vec<libc::pollfd>,
}

impl fmt::Debug for PollReadiness {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("PollReadiness")
            .field("registered", &self.fds.len())
            .finish()
    }
}

impl PollReadiness {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Readiness for PollReadiness {
    type Handle = NonBlockingFile;

    fn poll(&mut self, handles: &[&NonBlockingFile], timeout: Duration) -> io::Result<Vec<usize>> {
        self.fds.clear();
        self.fds.extend(handles.iter().map(|handle| libc::pollfd {
            fd: handle.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }));

        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        let ret = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(err);
        }

        // Hang-up and error conditions are surfaced by the following read.
        let ready_mask = libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
        let ready = self
            .fds
            .iter()
            .enumerate()
            .filter(|(_, pfd)| pfd.revents & ready_mask != 0)
            .map(|(idx, _)| idx)
            .collect();

        Ok(ready)
    }

    fn try_read(&mut self, handle: &mut NonBlockingFile, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match handle.file.read(buf) {
            Ok(0) if !buf.is_empty() => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }
}

/// Set a file descriptor to non-blocking mode.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK != 0 {
        return Ok(());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
