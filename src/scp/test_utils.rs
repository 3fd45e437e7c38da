use std::collections::VecDeque;
use std::io::{self, Read, Write};

use super::constants::ACK_OK;

/// Scripted stand-in for an exec channel: reads come from a preloaded
/// queue, writes are captured for inspection.
#[derive(Default)]
pub struct MockChannel {
    pub read_data: VecDeque<u8>,
    pub written: Vec<u8>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_data(mut self, data: &[u8]) -> Self {
        self.read_data.extend(data);
        self
    }

    pub fn push_read_data(&mut self, data: &[u8]) {
        self.read_data.extend(data);
    }

    pub fn push_ack(&mut self) {
        self.read_data.push_back(ACK_OK);
    }

    pub fn push_acks(&mut self, count: usize) {
        for _ in 0..count {
            self.push_ack();
        }
    }

    pub fn push_nack(&mut self, code: u8, message: &str) {
        self.read_data.push_back(code);
        self.read_data.extend(message.as_bytes());
        self.read_data.push_back(b'\n');
    }

    /// Queues a header line, appending the wire newline.
    pub fn push_header(&mut self, line: &str) {
        self.read_data.extend(line.as_bytes());
        self.read_data.push_back(b'\n');
    }
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.read_data.is_empty() {
            return Ok(0);
        }
        let mut n = 0;
        while n < buf.len() {
            match self.read_data.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
