use std::io::{self, Read, Write};

use log::debug;

use super::constants::*;
use super::entry::{EntryKind, ScpEntry};
use super::error::ScpError;

/// Transfer direction, fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Pull data from the remote peer (`scp -f`).
    From,
    /// Push data to the remote peer (`scp -t`).
    To,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    FileOnly,
    Recursive,
}

/// Builds the command line that starts the remote scp process.
///
/// The path is passed through unquoted, as the original protocol does;
/// callers own path hygiene.
pub fn scp_command(direction: Direction, copy_mode: CopyMode, path: &str) -> String {
    let flags = match direction {
        Direction::From => "-fq",
        Direction::To => "-tq",
    };
    let recursive = match copy_mode {
        CopyMode::Recursive => "r",
        CopyMode::FileOnly => "",
    };
    format!("scp {}{} {}", flags, recursive, path)
}

/// One open nesting level. Pushing a directory opens a scope; completing it
/// emits or consumes the end-of-directory framing. At most the top of the
/// stack may carry file data, and only while it is a file scope.
#[derive(Debug)]
enum Scope {
    Directory,
    FileIn { size: u64, remaining: u64 },
    FileOut { size: u64, written: u64 },
}

/// The SCP protocol engine: owns the channel's byte streams and the stack
/// of open entries, and exposes entry-at-a-time iteration in one direction.
///
/// Generic over the byte stream so the engine runs against an
/// `ssh2::Channel` in production and scripted buffers in tests. Strictly
/// single-threaded, blocking, lock-step: every control line is acknowledged
/// before the exchange moves on.
pub struct ScpConnection<S: Read + Write> {
    stream: S,
    direction: Direction,
    copy_mode: CopyMode,
    scopes: Vec<Scope>,
}

impl<S: Read + Write> ScpConnection<S> {
    /// Wraps an already-executing channel and performs the initial
    /// handshake: a pull connection signals readiness with an ack, a push
    /// connection waits for the peer's.
    pub fn new(stream: S, direction: Direction, copy_mode: CopyMode) -> Result<Self, ScpError> {
        let mut connection = Self {
            stream,
            direction,
            copy_mode,
            scopes: Vec::new(),
        };
        match direction {
            Direction::From => connection.write_ack()?,
            Direction::To => connection.read_ack()?,
        }
        Ok(connection)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn copy_mode(&self) -> CopyMode {
        self.copy_mode
    }

    /// Parses the next entry from the peer (pull direction).
    ///
    /// A still-open file scope is completed first, which validates that its
    /// declared size was fully consumed. Returns `Ok(None)` once the peer
    /// closes the stream; that is the normal end-of-listing signal, not an
    /// error.
    pub fn next_entry(&mut self) -> Result<Option<ScpEntry>, ScpError> {
        if self.direction != Direction::From {
            return Err(ScpError::Protocol(
                "next_entry called on a push connection".to_string(),
            ));
        }
        self.close_active_file()?;

        let Some(discriminant) = self.read_byte()? else {
            return Ok(None);
        };
        match discriminant {
            ACK_WARNING | ACK_FATAL => Err(self.read_remote_error()),
            MSG_FILE | MSG_DIRECTORY => {
                let Some(mode) = self.read_field(b' ')? else {
                    return Ok(None);
                };
                let Some(size_field) = self.read_field(b' ')? else {
                    return Ok(None);
                };
                let Some(name) = self.read_field(b'\n')? else {
                    return Ok(None);
                };
                let size: u64 = size_field.parse().map_err(|_| {
                    ScpError::Protocol(format!("malformed size field {:?}", size_field))
                })?;
                if discriminant == MSG_DIRECTORY {
                    if self.copy_mode != CopyMode::Recursive {
                        return Err(ScpError::Protocol(
                            "directory entry in single-file mode".to_string(),
                        ));
                    }
                    let entry = ScpEntry::directory_with_mode(&name, &mode)?;
                    debug!("recv: {}", entry);
                    self.scopes.push(Scope::Directory);
                    self.write_ack()?;
                    Ok(Some(entry))
                } else {
                    let entry = ScpEntry::file_with_mode(&name, size, &mode)?;
                    debug!("recv: {}", entry);
                    self.scopes.push(Scope::FileIn {
                        size,
                        remaining: size,
                    });
                    self.write_ack()?;
                    Ok(Some(entry))
                }
            }
            MSG_END_OF_DIRECTORY => {
                if self.copy_mode != CopyMode::Recursive {
                    return Err(ScpError::Protocol(
                        "end-of-directory entry in single-file mode".to_string(),
                    ));
                }
                match self.read_byte()? {
                    Some(b'\n') | None => {}
                    Some(other) => {
                        return Err(ScpError::Protocol(format!(
                            "expected newline after end-of-directory, got 0x{:02x}",
                            other
                        )))
                    }
                }
                debug!("recv: E");
                self.close_through_directory()?;
                Ok(Some(ScpEntry::end_of_directory()))
            }
            other => Err(ScpError::Protocol(format!(
                "unsupported protocol message 0x{:02x}",
                other
            ))),
        }
    }

    /// Announces the next entry to the peer (push direction).
    ///
    /// An end-of-directory entry completes every scope up to and including
    /// the nearest open directory. Any other entry first completes a
    /// still-open file scope (the implicit move to the next sibling), then
    /// writes its header line and awaits the ack.
    pub fn put_entry(&mut self, entry: &ScpEntry) -> Result<(), ScpError> {
        if self.direction != Direction::To {
            return Err(ScpError::Protocol(
                "put_entry called on a pull connection".to_string(),
            ));
        }
        match entry.kind() {
            EntryKind::EndOfDirectory => {
                if self.copy_mode != CopyMode::Recursive {
                    return Err(ScpError::Protocol(
                        "end-of-directory entry in single-file mode".to_string(),
                    ));
                }
                self.close_through_directory()
            }
            EntryKind::Directory => {
                if self.copy_mode != CopyMode::Recursive {
                    return Err(ScpError::Protocol(
                        "directory entry in single-file mode".to_string(),
                    ));
                }
                self.close_active_file()?;
                self.write_message(&entry.wire_line())?;
                self.scopes.push(Scope::Directory);
                Ok(())
            }
            EntryKind::File => {
                self.close_active_file()?;
                self.write_message(&entry.wire_line())?;
                self.scopes.push(Scope::FileOut {
                    size: entry.size(),
                    written: 0,
                });
                Ok(())
            }
        }
    }

    /// Reads payload bytes of the active file entry, bounded by its
    /// declared size. Returns 0 once the entry is exhausted.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, ScpError> {
        let Some(Scope::FileIn { remaining, .. }) = self.scopes.last_mut() else {
            return Err(ScpError::NoActiveEntry);
        };
        if *remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (*remaining).min(buf.len() as u64) as usize;
        let n = loop {
            match self.stream.read(&mut buf[..want]) {
                Ok(0) => {
                    return Err(ScpError::Protocol(
                        "channel closed inside file data".to_string(),
                    ))
                }
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        *remaining -= n as u64;
        Ok(n)
    }

    /// Writes payload bytes of the active file entry. Exceeding the
    /// declared size fails immediately, before anything reaches the wire.
    pub fn write_data(&mut self, buf: &[u8]) -> Result<usize, ScpError> {
        let Some(Scope::FileOut { size, written }) = self.scopes.last_mut() else {
            return Err(ScpError::NoActiveEntry);
        };
        if *written + buf.len() as u64 > *size {
            return Err(ScpError::TooManyBytes { declared: *size });
        }
        self.stream.write_all(buf)?;
        *written += buf.len() as u64;
        Ok(buf.len())
    }

    pub fn flush(&mut self) -> Result<(), ScpError> {
        self.stream.flush()?;
        Ok(())
    }

    /// Completes every remaining scope, innermost first. Every scope gets a
    /// completion attempt even if an earlier one fails; the first error is
    /// surfaced after all attempts have run.
    pub fn finish(&mut self) -> Result<(), ScpError> {
        let mut first_error: Option<ScpError> = None;
        while let Some(scope) = self.scopes.pop() {
            if let Err(err) = self.complete_scope(scope) {
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = self.stream.flush() {
            first_error.get_or_insert(err.into());
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Releases the underlying channel stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn close_active_file(&mut self) -> Result<(), ScpError> {
        if matches!(
            self.scopes.last(),
            Some(Scope::FileIn { .. } | Scope::FileOut { .. })
        ) {
            if let Some(scope) = self.scopes.pop() {
                self.complete_scope(scope)?;
            }
        }
        Ok(())
    }

    /// Pops and completes scopes until a directory scope has been popped,
    /// inclusive. Models the rule that one end-of-directory marker closes
    /// the most recently opened directory and everything still open below.
    fn close_through_directory(&mut self) -> Result<(), ScpError> {
        while let Some(scope) = self.scopes.pop() {
            let was_directory = matches!(scope, Scope::Directory);
            self.complete_scope(scope)?;
            if was_directory {
                return Ok(());
            }
        }
        Err(ScpError::Protocol(
            "end of directory with no open directory".to_string(),
        ))
    }

    fn complete_scope(&mut self, scope: Scope) -> Result<(), ScpError> {
        match scope {
            Scope::Directory => match self.direction {
                // Mirrored ack for the consumed end-of-directory marker.
                Direction::From => self.write_ack(),
                Direction::To => self.write_message("E"),
            },
            Scope::FileIn { size, remaining } => {
                if remaining != 0 {
                    return Err(ScpError::ShortTransfer {
                        expected: size,
                        actual: size - remaining,
                    });
                }
                self.write_ack()?;
                self.read_ack()
            }
            Scope::FileOut { size, written } => {
                if written != size {
                    return Err(ScpError::ShortTransfer {
                        expected: size,
                        actual: written,
                    });
                }
                self.write_ack()?;
                self.read_ack()
            }
        }
    }

    /// Writes one control line, flushes, and waits for the peer's ack,
    /// matching the lock-step nature of the protocol.
    fn write_message(&mut self, line: &str) -> Result<(), ScpError> {
        debug!("send: {}", line);
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;
        self.read_ack()
    }

    fn write_ack(&mut self) -> Result<(), ScpError> {
        self.stream.write_all(&[ACK_OK])?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_ack(&mut self) -> Result<(), ScpError> {
        match self.read_byte()? {
            Some(ACK_OK) => Ok(()),
            Some(ACK_WARNING | ACK_FATAL) => Err(self.read_remote_error()),
            Some(other) => Err(ScpError::Protocol(format!(
                "unexpected ack byte 0x{:02x}",
                other
            ))),
            None => Err(ScpError::Protocol(
                "channel closed while waiting for ack".to_string(),
            )),
        }
    }

    /// Drains the newline-terminated error text following ack byte 1 or 2.
    /// Warning and fatal are surfaced identically.
    fn read_remote_error(&mut self) -> ScpError {
        let mut message = Vec::new();
        loop {
            match self.read_byte() {
                Ok(Some(b'\n')) | Ok(None) | Err(_) => break,
                Ok(Some(byte)) => {
                    if message.len() >= MAX_FIELD_LENGTH {
                        break;
                    }
                    message.push(byte);
                }
            }
        }
        ScpError::Remote(String::from_utf8_lossy(&message).into_owned())
    }

    /// Reads one header field byte-for-byte up to the terminator, bounded
    /// at `MAX_FIELD_LENGTH`. `Ok(None)` means the stream ended mid-field,
    /// which callers treat as no-more-entries. Deliberately not
    /// line-oriented: binary payload follows a header immediately.
    fn read_field(&mut self, terminator: u8) -> Result<Option<String>, ScpError> {
        let mut field = Vec::new();
        loop {
            let Some(byte) = self.read_byte()? else {
                return Ok(None);
            };
            if byte == terminator {
                return Ok(Some(String::from_utf8_lossy(&field).into_owned()));
            }
            if field.len() >= MAX_FIELD_LENGTH {
                return Err(ScpError::Protocol(format!(
                    "header field exceeds {} bytes",
                    MAX_FIELD_LENGTH
                )));
            }
            field.push(byte);
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ScpError> {
        let mut buf = [0u8; 1];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
