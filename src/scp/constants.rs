/// Ack byte: success.
pub const ACK_OK: u8 = 0;
/// Ack byte: error, followed by a newline-terminated message.
pub const ACK_WARNING: u8 = 1;
/// Ack byte: fatal error, followed by a newline-terminated message.
pub const ACK_FATAL: u8 = 2;

// Header discriminants on the wire.
pub const MSG_FILE: u8 = b'C';
pub const MSG_DIRECTORY: u8 = b'D';
pub const MSG_END_OF_DIRECTORY: u8 = b'E';

/// Upper bound on a single header field (mode, size or name).
pub const MAX_FIELD_LENGTH: usize = 1024;

pub const DEFAULT_FILE_MODE: &str = "0640";
pub const DEFAULT_DIRECTORY_MODE: &str = "0750";
