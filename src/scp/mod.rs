pub mod connection;
pub mod constants;
pub mod entry;
pub mod error;
pub mod file;
pub mod session;
pub mod stream;

#[cfg(test)]
pub mod test_utils;

pub use connection::{scp_command, CopyMode, Direction, ScpConnection};
pub use entry::{EntryKind, ScpEntry};
pub use error::ScpError;
pub use file::{ScpFile, ScpFileInputStream, ScpFileOutputStream};
pub use session::{ChannelFactory, SshConfig, SshSession};
pub use stream::{ScpInputStream, ScpOutputStream};
