pub mod scp;

pub use scp::error::ScpError;
pub type Result<T> = std::result::Result<T, ScpError>;
