use std::fmt;

use super::constants::{DEFAULT_DIRECTORY_MODE, DEFAULT_FILE_MODE};
use super::error::ScpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    EndOfDirectory,
}

/// One item of the SCP header stream: a file, a directory, or the marker
/// closing the most recently opened directory. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScpEntry {
    kind: EntryKind,
    name: Option<String>,
    size: u64,
    mode: Option<String>,
}

impl ScpEntry {
    pub fn file(name: &str, size: u64) -> Result<Self, ScpError> {
        Self::file_with_mode(name, size, DEFAULT_FILE_MODE)
    }

    pub fn file_with_mode(name: &str, size: u64, mode: &str) -> Result<Self, ScpError> {
        check_name(name)?;
        Ok(Self {
            kind: EntryKind::File,
            name: Some(name.to_string()),
            size,
            mode: Some(normalize_mode(mode)?),
        })
    }

    pub fn directory(name: &str) -> Result<Self, ScpError> {
        Self::directory_with_mode(name, DEFAULT_DIRECTORY_MODE)
    }

    pub fn directory_with_mode(name: &str, mode: &str) -> Result<Self, ScpError> {
        check_name(name)?;
        Ok(Self {
            kind: EntryKind::Directory,
            name: Some(name.to_string()),
            size: 0,
            mode: Some(normalize_mode(mode)?),
        })
    }

    pub fn end_of_directory() -> Self {
        Self {
            kind: EntryKind::EndOfDirectory,
            name: None,
            size: 0,
            mode: None,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Normalized four-digit octal mode, absent for end-of-directory.
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_end_of_directory(&self) -> bool {
        self.kind == EntryKind::EndOfDirectory
    }

    /// Canonical wire form without the trailing newline:
    /// `C<mode> <size> <name>`, `D<mode> <size> <name>`, or `E`.
    /// Used for emission and logging only; parsing is field-by-field.
    pub fn wire_line(&self) -> String {
        match self.kind {
            EntryKind::File => format!(
                "C{} {} {}",
                self.mode.as_deref().unwrap_or(DEFAULT_FILE_MODE),
                self.size,
                self.name.as_deref().unwrap_or("")
            ),
            EntryKind::Directory => format!(
                "D{} {} {}",
                self.mode.as_deref().unwrap_or(DEFAULT_DIRECTORY_MODE),
                self.size,
                self.name.as_deref().unwrap_or("")
            ),
            EntryKind::EndOfDirectory => "E".to_string(),
        }
    }
}

impl fmt::Display for ScpEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_line())
    }
}

/// Accepts `[0-2]?[0-7]{3}` and left-pads three-digit modes to four,
/// matching the `oNNNN` convention scp uses on the wire.
fn normalize_mode(mode: &str) -> Result<String, ScpError> {
    let bytes = mode.as_bytes();
    let valid = match bytes.len() {
        3 => bytes.iter().all(|b| (b'0'..=b'7').contains(b)),
        4 => {
            (b'0'..=b'2').contains(&bytes[0])
                && bytes[1..].iter().all(|b| (b'0'..=b'7').contains(b))
        }
        _ => false,
    };
    if !valid {
        return Err(ScpError::InvalidMode(mode.to_string()));
    }
    if bytes.len() == 3 {
        Ok(format!("0{}", mode))
    } else {
        Ok(mode.to_string())
    }
}

// Names travel unquoted on the wire and get joined onto local paths when
// downloading, so path separators and newlines are rejected outright.
fn check_name(name: &str) -> Result<(), ScpError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\n']) {
        return Err(ScpError::Protocol(format!("invalid entry name {:?}", name)));
    }
    Ok(())
}
