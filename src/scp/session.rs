use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;

use log::{debug, info, warn};
use ssh2::{Channel, Session};

use super::connection::{scp_command, CopyMode, Direction, ScpConnection};
use super::error::ScpError;

/// The sole transport contract the protocol engine consumes: something
/// that can run a remote command and hand back its bidirectional byte
/// stream. The engine never constructs transport, auth or crypto itself.
pub trait ChannelFactory {
    type Channel: Read + Write;

    fn open(&mut self, command: &str) -> Result<Self::Channel, ScpError>;

    fn release(&mut self, channel: Self::Channel) -> Result<(), ScpError>;
}

#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub key_path: Option<PathBuf>,
    pub password: Option<String>,
}

/// An authenticated SSH session that opens exec channels for scp commands.
pub struct SshSession {
    session: Session,
}

impl SshSession {
    pub fn connect(config: &SshConfig) -> Result<Self, ScpError> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).map_err(|e| {
            ScpError::Connect(format!(
                "failed to connect to {}:{}: {}",
                config.host, config.port, e
            ))
        })?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| ScpError::Connect(format!("handshake failed: {}", e)))?;

        if let Some(key) = &config.key_path {
            session
                .userauth_pubkey_file(&config.user, None, key, None)
                .map_err(|e| ScpError::Authentication(format!("key auth failed: {}", e)))?;
        } else if let Some(password) = &config.password {
            session
                .userauth_password(&config.user, password)
                .map_err(|e| ScpError::Authentication(format!("password auth failed: {}", e)))?;
        } else if session.userauth_agent(&config.user).is_err() || !session.authenticated() {
            // Agent failed, fall back to the default key locations.
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            let default_keys = [
                PathBuf::from(&home).join(".ssh/id_rsa"),
                PathBuf::from(&home).join(".ssh/id_ed25519"),
            ];
            for key in default_keys {
                if key.exists()
                    && session
                        .userauth_pubkey_file(&config.user, None, &key, None)
                        .is_ok()
                    && session.authenticated()
                {
                    break;
                }
            }
        }

        if !session.authenticated() {
            return Err(ScpError::Authentication(
                "no authentication method succeeded".to_string(),
            ));
        }
        info!(
            "connected to {}:{} as {}",
            config.host, config.port, config.user
        );
        Ok(Self { session })
    }

    /// Starts `scp -fq[r] <path>` on the remote side and wraps the channel
    /// in a pull-direction connection.
    pub fn open_pull(
        &mut self,
        path: &str,
        copy_mode: CopyMode,
    ) -> Result<ScpConnection<Channel>, ScpError> {
        let channel = self.open(&scp_command(Direction::From, copy_mode, path))?;
        ScpConnection::new(channel, Direction::From, copy_mode)
    }

    /// Starts `scp -tq[r] <path>` on the remote side and wraps the channel
    /// in a push-direction connection.
    pub fn open_push(
        &mut self,
        path: &str,
        copy_mode: CopyMode,
    ) -> Result<ScpConnection<Channel>, ScpError> {
        let channel = self.open(&scp_command(Direction::To, copy_mode, path))?;
        ScpConnection::new(channel, Direction::To, copy_mode)
    }

    pub fn disconnect(&mut self) -> Result<(), ScpError> {
        self.session.disconnect(None, "closing", None)?;
        Ok(())
    }
}

impl ChannelFactory for SshSession {
    type Channel = Channel;

    fn open(&mut self, command: &str) -> Result<Channel, ScpError> {
        debug!("exec: {}", command);
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;
        Ok(channel)
    }

    /// Best-effort teardown: every step runs even if an earlier one fails,
    /// and the first error is surfaced afterwards.
    fn release(&mut self, mut channel: Channel) -> Result<(), ScpError> {
        let mut first_error: Option<ScpError> = None;
        if let Err(err) = channel.send_eof() {
            first_error.get_or_insert(err.into());
        }
        if let Err(err) = channel.wait_eof() {
            first_error.get_or_insert(err.into());
        }
        if let Err(err) = channel.close() {
            first_error.get_or_insert(err.into());
        }
        if let Err(err) = channel.wait_close() {
            first_error.get_or_insert(err.into());
        }
        match channel.exit_status() {
            Ok(0) | Err(_) => {}
            Ok(status) => warn!("remote scp exited with status {}", status),
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
