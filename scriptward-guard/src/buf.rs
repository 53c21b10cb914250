use nix::errno::Errno;
use std::fmt;

/// Fixed-capacity byte buffer living on the stack.
///
/// Used from the signal handler, where heap allocation is best avoided.
/// Writes past capacity are dropped, never reported.
pub(crate) struct LineBuf<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> LineBuf<N> {
    pub(crate) const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    pub(crate) fn push_bytes(&mut self, data: &[u8]) {
        let take = data.len().min(N - self.len);
        self.bytes[self.len..self.len + take].copy_from_slice(&data[..take]);
        self.len += take;
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// End the buffer with a newline, overwriting the last byte when full.
    pub(crate) fn terminate_line(&mut self) {
        if N == 0 {
            return;
        }
        if self.len == N {
            self.bytes[N - 1] = b'\n';
        } else {
            self.bytes[self.len] = b'\n';
            self.len += 1;
        }
    }
}

impl<const N: usize> fmt::Write for LineBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_bytes(s.as_bytes());
        Ok(())
    }
}

/// Write all of `data` to a raw descriptor, retrying on EINTR and short writes.
pub(crate) fn write_fd(fd: libc::c_int, mut data: &[u8]) {
    while !data.is_empty() {
        let n = unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) };
        if n < 0 {
            if Errno::last() == Errno::EINTR {
                continue;
            }
            return;
        }
        if n == 0 {
            return;
        }
        data = &data[n as usize..];
    }
}

/// Write `line` followed by a newline to a raw descriptor.
pub(crate) fn write_line(fd: libc::c_int, line: &[u8]) {
    write_fd(fd, line);
    write_fd(fd, b"\n");
}
