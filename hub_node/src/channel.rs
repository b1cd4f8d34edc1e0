//! Byte-stream command channel.
//!
//! The stream poller asks the channel whether input is waiting without
//! blocking, and only then reads one 9-byte frame.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::sync::Arc;

use hub_common::consts::FRAME_LEN;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use parking_lot::Mutex;
use tracing::info;

/// Inbound byte stream carrying command frames.
pub trait StreamChannel: Send {
    /// Returns true when a read would not block.
    fn poll_ready(&mut self) -> io::Result<bool>;

    /// Read up to one frame into `buf`, returning the byte count.
    ///
    /// Fewer than `FRAME_LEN` bytes means the stream ended mid-frame; zero
    /// means it ended cleanly.
    fn read_frame_bytes(&mut self, buf: &mut [u8; FRAME_LEN]) -> io::Result<usize>;
}

/// Standard input as the command stream.
#[derive(Debug, Default)]
pub struct StdinChannel {
    closed: bool,
}

impl StdinChannel {
    /// Channel over the process's stdin.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamChannel for StdinChannel {
    fn poll_ready(&mut self) -> io::Result<bool> {
        if self.closed {
            return Ok(false);
        }
        let stdin = io::stdin();
        let mut fds = [PollFd::new(stdin.as_fd(), PollFlags::POLLIN)];
        let ready = poll(&mut fds, PollTimeout::ZERO).map_err(io::Error::from)?;
        if ready == 0 {
            return Ok(false);
        }
        Ok(fds[0]
            .revents()
            .is_some_and(|ev| ev.intersects(PollFlags::POLLIN | PollFlags::POLLHUP)))
    }

    fn read_frame_bytes(&mut self, buf: &mut [u8; FRAME_LEN]) -> io::Result<usize> {
        let mut stdin = io::stdin().lock();
        let mut filled = 0;
        while filled < FRAME_LEN {
            match stdin.read(&mut buf[filled..]) {
                Ok(0) => {
                    info!("Command stream closed");
                    self.closed = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// In-memory stream shared between a writer handle and the poller.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    bytes: Arc<Mutex<VecDeque<u8>>>,
}

impl MemoryStream {
    /// Empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one encoded frame.
    pub fn push_frame(&self, frame: [u8; FRAME_LEN]) {
        self.push_bytes(&frame);
    }

    /// Append raw bytes, for feeding partial or malformed input.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.bytes.lock().extend(bytes.iter().copied());
    }

    /// Bytes not yet consumed.
    pub fn pending(&self) -> usize {
        self.bytes.lock().len()
    }
}

impl StreamChannel for MemoryStream {
    fn poll_ready(&mut self) -> io::Result<bool> {
        Ok(!self.bytes.lock().is_empty())
    }

    fn read_frame_bytes(&mut self, buf: &mut [u8; FRAME_LEN]) -> io::Result<usize> {
        let mut queue = self.bytes.lock();
        let n = queue.len().min(FRAME_LEN);
        for (dst, src) in buf.iter_mut().zip(queue.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_stream_yields_whole_frames() {
        let writer = MemoryStream::new();
        let mut reader = writer.clone();
        assert!(!reader.poll_ready().unwrap());

        writer.push_frame([0x20, 0, 0, 0, 0, 0, 0, 0, 0]);
        writer.push_bytes(&[0x31, 0, 0]);
        assert!(reader.poll_ready().unwrap());

        let mut buf = [0u8; FRAME_LEN];
        assert_eq!(reader.read_frame_bytes(&mut buf).unwrap(), FRAME_LEN);
        assert_eq!(buf[0], 0x20);
        assert_eq!(reader.read_frame_bytes(&mut buf).unwrap(), 3);
        assert_eq!(writer.pending(), 0);
    }
}
