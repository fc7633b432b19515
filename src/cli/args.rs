use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::params::ResolveOptions;

#[derive(Parser, Debug)]
#[command(name = "sshstore", version, about = "SSH-backed object store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v for verbose, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode: suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy a file (either side may be an ssh:// locator)
    Cp(CpArgs),

    /// List a remote directory
    Ls(RemoteArgs),

    /// Show metadata for a remote path
    Stat(RemoteArgs),

    /// Remove a remote file
    Rm(RemoteArgs),
}

/// Connection flags shared by every command that dials out.
#[derive(clap::Args, Debug, Default)]
pub struct ConnectArgs {
    /// Username (overrides the locator and ~/.ssh/config)
    #[arg(long)]
    pub user: Option<String>,

    /// Port (overrides the locator and ~/.ssh/config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Private key file (takes precedence over ~/.ssh/config IdentityFile)
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Prompt for a password if none is available
    #[arg(long)]
    pub ask_password: bool,

    /// Prompt for a key passphrase if none is available
    #[arg(long)]
    pub ask_passphrase: bool,

    /// Connection timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Verify host keys against ~/.ssh/known_hosts instead of auto-accepting
    #[arg(long)]
    pub known_hosts: bool,
}

impl ConnectArgs {
    /// Fold these flags into resolver options for the given host.
    ///
    /// Flag values are the explicit (highest-precedence) source; a user or
    /// port already present from the locator is only kept when the flag is
    /// absent.
    pub fn to_options(&self, host: &str, user: Option<&str>, port: Option<u16>) -> ResolveOptions {
        ResolveOptions {
            host: Some(host.to_string()),
            user: self.user.clone().or_else(|| user.map(str::to_string)),
            port: self.port.or(port),
            keyfile: self.keyfile.clone(),
            ask_password: self.ask_password,
            ask_passphrase: self.ask_passphrase,
            timeout: self.timeout.map(Duration::from_secs),
            ..ResolveOptions::default()
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct CpArgs {
    /// Source path or locator (e.g. file.txt, ssh://user@host/path)
    pub source: String,

    /// Destination path or locator
    pub dest: String,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(clap::Args, Debug)]
pub struct RemoteArgs {
    /// Remote locator (ssh://[user@]host[:port]/path)
    pub locator: String,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cp_parses_with_connection_flags() {
        let cli = Cli::parse_from([
            "sshstore",
            "cp",
            "local.bin",
            "ssh://host/data/obj",
            "--user",
            "alice",
            "--port",
            "2222",
            "--ask-password",
        ]);
        match cli.command {
            Commands::Cp(args) => {
                assert_eq!(args.source, "local.bin");
                assert_eq!(args.connect.user.as_deref(), Some("alice"));
                assert_eq!(args.connect.port, Some(2222));
                assert!(args.connect.ask_password);
            }
            other => panic!("expected Cp, got {:?}", other),
        }
    }

    #[test]
    fn flag_user_beats_locator_user() {
        let connect = ConnectArgs {
            user: Some("flag".to_string()),
            ..ConnectArgs::default()
        };
        let opts = connect.to_options("h", Some("locator"), None);
        assert_eq!(opts.user.as_deref(), Some("flag"));

        let connect = ConnectArgs::default();
        let opts = connect.to_options("h", Some("locator"), Some(2200));
        assert_eq!(opts.user.as_deref(), Some("locator"));
        assert_eq!(opts.port, Some(2200));
    }
}
