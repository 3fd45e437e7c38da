use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use log::{error, LevelFilter};

use rscp::scp::{ScpFile, SshConfig, SshSession};

#[derive(Parser)]
#[command(name = "rscp", about = "SCP client over libssh2", version)]
struct Cli {
    /// Remote host name or address.
    #[arg(long)]
    host: String,

    #[arg(long, default_value_t = 22)]
    port: u16,

    #[arg(short, long)]
    user: String,

    /// Private key file; falls back to the SSH agent and default keys.
    #[arg(long)]
    key: Option<PathBuf>,

    #[arg(long)]
    password: Option<String>,

    /// Log the protocol exchange.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a remote file or tree.
    Get {
        remote: String,
        local: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Upload a local file or tree.
    Put {
        local: PathBuf,
        remote: String,
        #[arg(short, long)]
        recursive: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    if let Err(err) = run(cli) {
        error!("{}", err);
        exit(1);
    }
}

fn run(cli: Cli) -> rscp::Result<()> {
    let config = SshConfig {
        host: cli.host,
        port: cli.port,
        user: cli.user,
        key_path: cli.key,
        password: cli.password,
    };
    let mut session = SshSession::connect(&config)?;

    match cli.command {
        Command::Get {
            remote,
            local,
            recursive,
        } => {
            let mut file = ScpFile::new(&mut session, &remote);
            if recursive {
                file.download_tree(&local)?;
            } else {
                file.copy_to_local(&local)?;
            }
        }
        Command::Put {
            local,
            remote,
            recursive,
        } => {
            let mut file = ScpFile::new(&mut session, &remote);
            if recursive {
                file.upload_tree(&local)?;
            } else {
                file.copy_from_local(&local)?;
            }
        }
    }

    session.disconnect()
}
