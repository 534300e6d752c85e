//! Private channels that receive redirected output.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::str::FromStr;

/// Kind of private channel used to intercept output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    /// Unnamed temporary file. Never blocks the writer.
    #[default]
    TempFile,
    /// OS pipe with a non-blocking write end, sized to hold the whole buffer.
    /// Output beyond the pipe size is dropped.
    Pipe,
}

impl ChannelKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelKind::TempFile => "temp-file",
            ChannelKind::Pipe => "pipe",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temp-file" | "tempfile" | "file" => Ok(ChannelKind::TempFile),
            "pipe" => Ok(ChannelKind::Pipe),
            other => Err(format!("unknown capture channel: {other}")),
        }
    }
}

/// An open private channel.
pub(crate) enum Channel {
    TempFile(File),
    Pipe {
        reader: File,
        writer: Option<OwnedFd>,
    },
}

impl Channel {
    /// Open a channel of the requested kind.
    ///
    /// A pipe that cannot be created, or cannot be grown to `capacity`,
    /// falls back to a temporary file.
    pub(crate) fn open(kind: ChannelKind, capacity: usize) -> io::Result<Self> {
        match kind {
            ChannelKind::TempFile => open_temp_file(),
            ChannelKind::Pipe => match pipe::open(capacity) {
                Ok(channel) => Ok(channel),
                Err(e) => {
                    tracing::warn!("Capture pipe unavailable, using a temp file: {}", e);
                    open_temp_file()
                }
            },
        }
    }

    pub(crate) fn kind(&self) -> ChannelKind {
        match self {
            Channel::TempFile(_) => ChannelKind::TempFile,
            Channel::Pipe { .. } => ChannelKind::Pipe,
        }
    }

    /// Descriptor the redirected streams should write to.
    pub(crate) fn write_fd(&self) -> Option<BorrowedFd<'_>> {
        match self {
            Channel::TempFile(file) => Some(file.as_fd()),
            Channel::Pipe { writer, .. } => writer.as_ref().map(|w| w.as_fd()),
        }
    }

    /// Drop this channel's own reference to the write side.
    ///
    /// For a pipe, EOF is only seen once every write end is closed; after
    /// this the redirected stdout/stderr hold the last ones.
    pub(crate) fn close_writer(&mut self) {
        if let Channel::Pipe { writer, .. } = self {
            writer.take();
        }
    }

    /// Copy captured bytes into `buffer`, leaving it NUL-terminated.
    ///
    /// Returns the number of bytes copied (excluding the NUL) and whether
    /// more output was available than fit.
    pub(crate) fn drain_into(self, buffer: &mut [u8]) -> (usize, bool) {
        match self {
            Channel::TempFile(mut file) => {
                if file.seek(SeekFrom::Start(0)).is_err() {
                    return terminate_empty(buffer);
                }
                read_bounded(&mut file, buffer)
            }
            Channel::Pipe { mut reader, writer } => {
                drop(writer);
                read_bounded(&mut reader, buffer)
            }
        }
    }
}

fn open_temp_file() -> io::Result<Channel> {
    tempfile::tempfile().map(Channel::TempFile)
}

fn terminate_empty(buffer: &mut [u8]) -> (usize, bool) {
    if let Some(first) = buffer.first_mut() {
        *first = 0;
    }
    (0, false)
}

/// Read up to `buffer.len() - 1` bytes, stopping at EOF or on error, then
/// NUL-terminate.
pub(crate) fn read_bounded<R: Read>(reader: &mut R, buffer: &mut [u8]) -> (usize, bool) {
    let Some(limit) = buffer.len().checked_sub(1) else {
        return (0, false);
    };

    let mut filled = 0;
    while filled < limit {
        match reader.read(&mut buffer[filled..limit]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    let truncated = filled == limit && has_more(reader);
    buffer[filled] = 0;
    (filled, truncated)
}

fn has_more<R: Read>(reader: &mut R) -> bool {
    let mut probe = [0u8; 1];
    loop {
        match reader.read(&mut probe) {
            Ok(n) => return n > 0,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return false,
        }
    }
}

mod pipe {
    use super::Channel;
    use libc::c_int;
    use std::fs::File;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

    pub(super) fn open(capacity: usize) -> io::Result<Channel> {
        let mut fds: [c_int; 2] = [-1, -1];
        // SAFETY: fds has room for the two descriptors pipe(2) writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: both descriptors are freshly created and owned by nobody else.
        let (reader, writer) =
            unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        set_fd_flag(reader.as_raw_fd(), libc::F_GETFD, libc::F_SETFD, libc::FD_CLOEXEC)?;
        set_fd_flag(writer.as_raw_fd(), libc::F_GETFD, libc::F_SETFD, libc::FD_CLOEXEC)?;
        // The single calling thread is also the only reader, and it only
        // reads after the tool returns; a blocking writer would deadlock.
        set_fd_flag(writer.as_raw_fd(), libc::F_GETFL, libc::F_SETFL, libc::O_NONBLOCK)?;

        // Output past the pipe size is dropped without a trace, so the pipe
        // must hold the whole buffer plus the byte that detects truncation.
        let size = grow(writer.as_raw_fd(), capacity)?;
        if size < capacity {
            return Err(io::Error::other(format!(
                "pipe holds {size} bytes, capture needs {capacity}"
            )));
        }

        Ok(Channel::Pipe {
            reader: File::from(reader),
            writer: Some(writer),
        })
    }

    fn set_fd_flag(fd: RawFd, get: c_int, set: c_int, flag: c_int) -> io::Result<()> {
        // SAFETY: fcntl on a descriptor we own.
        let current = unsafe { libc::fcntl(fd, get) };
        if current == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as above.
        if unsafe { libc::fcntl(fd, set, current | flag) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Grow the pipe buffer toward `capacity` and return its resulting size.
    #[cfg(target_os = "linux")]
    fn grow(fd: RawFd, capacity: usize) -> io::Result<usize> {
        let Ok(wanted) = c_int::try_from(capacity) else {
            return Err(io::Error::other(format!("capacity {capacity} exceeds any pipe")));
        };
        // SAFETY: fcntl on a descriptor we own.
        let current = unsafe { libc::fcntl(fd, libc::F_GETPIPE_SZ) };
        if current < 0 {
            return Err(io::Error::last_os_error());
        }
        if wanted > current {
            // SAFETY: as above; failure leaves the size as is.
            unsafe { libc::fcntl(fd, libc::F_SETPIPE_SZ, wanted) };
        }
        // SAFETY: as above.
        let size = unsafe { libc::fcntl(fd, libc::F_GETPIPE_SZ) };
        if size < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(size as usize)
    }

    /// The size cannot be queried here; assume the POSIX minimum.
    #[cfg(not(target_os = "linux"))]
    fn grow(_fd: RawFd, _capacity: usize) -> io::Result<usize> {
        Ok(POSIX_PIPE_BUF)
    }

    #[cfg(not(target_os = "linux"))]
    const POSIX_PIPE_BUF: usize = 512;
}
