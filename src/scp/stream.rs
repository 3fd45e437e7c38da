use std::io::{self, Read, Write};

use super::connection::{CopyMode, Direction, ScpConnection};
use super::entry::ScpEntry;
use super::error::ScpError;

/// Pull-direction adapter pairing a connection with the byte stream of the
/// currently active entry. Reads fail with an illegal-state error until
/// `next_entry` has produced a file entry.
pub struct ScpInputStream<S: Read + Write> {
    connection: ScpConnection<S>,
}

impl<S: Read + Write> ScpInputStream<S> {
    pub fn new(stream: S, copy_mode: CopyMode) -> Result<Self, ScpError> {
        Ok(Self {
            connection: ScpConnection::new(stream, Direction::From, copy_mode)?,
        })
    }

    /// Advances to the next entry; `None` marks the end of the listing.
    pub fn next_entry(&mut self) -> Result<Option<ScpEntry>, ScpError> {
        self.connection.next_entry()
    }

    pub fn finish(&mut self) -> Result<(), ScpError> {
        self.connection.finish()
    }

    pub fn into_inner(self) -> S {
        self.connection.into_inner()
    }
}

impl<S: Read + Write> Read for ScpInputStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connection.read_data(buf).map_err(io::Error::from)
    }
}

/// Push-direction counterpart of [`ScpInputStream`].
pub struct ScpOutputStream<S: Read + Write> {
    connection: ScpConnection<S>,
}

impl<S: Read + Write> ScpOutputStream<S> {
    pub fn new(stream: S, copy_mode: CopyMode) -> Result<Self, ScpError> {
        Ok(Self {
            connection: ScpConnection::new(stream, Direction::To, copy_mode)?,
        })
    }

    pub fn put_entry(&mut self, entry: &ScpEntry) -> Result<(), ScpError> {
        self.connection.put_entry(entry)
    }

    pub fn finish(&mut self) -> Result<(), ScpError> {
        self.connection.finish()
    }

    pub fn into_inner(self) -> S {
        self.connection.into_inner()
    }
}

impl<S: Read + Write> Write for ScpOutputStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.connection.write_data(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.connection.flush().map_err(io::Error::from)
    }
}
