use rscp::scp::{SshConfig, SshSession};

/// Connection details for the live tests, taken from the environment so
/// the suite can point at any throwaway sshd.
pub fn test_config() -> Option<SshConfig> {
    let host = std::env::var("RSCP_TEST_HOST").ok()?;
    let user = std::env::var("RSCP_TEST_USER").ok()?;
    let port = std::env::var("RSCP_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(22);
    let password = std::env::var("RSCP_TEST_PASSWORD").ok();
    let key_path = std::env::var("RSCP_TEST_KEY").ok().map(Into::into);
    Some(SshConfig {
        host,
        port,
        user,
        key_path,
        password,
    })
}

pub fn connect() -> Result<SshSession, Box<dyn std::error::Error>> {
    let config = test_config().ok_or("RSCP_TEST_HOST and RSCP_TEST_USER must be set")?;
    Ok(SshSession::connect(&config)?)
}
