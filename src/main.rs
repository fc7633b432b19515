use std::sync::Arc;

use bytesize::ByteSize;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sshstore::cli::args::{Cli, Commands, ConnectArgs, CpArgs, RemoteArgs};
use sshstore::cli::Verbosity;
use sshstore::config::params::ResolveOptions;
use sshstore::config::resolver::ConnectionResolver;
use sshstore::config::ssh_config::SshClientConfig;
use sshstore::error::StoreError;
use sshstore::session::host_key::KnownHostsPolicy;
use sshstore::store::local::LocalStore;
use sshstore::store::locator::{self, Location, SshLocator};
use sshstore::store::ssh::SshStore;
use sshstore::store::ObjectStore;
use sshstore::transfer::progress::{transfer_bar, ProgressReader};

fn main() {
    let cli = Cli::parse();

    let verbosity = Verbosity::from((cli.quiet, cli.verbose));

    // RUST_LOG env var overrides CLI flags.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.as_tracing_filter())),
        )
        .with_writer(std::io::stderr) // keep stdout clean for output
        .init();

    if let Err(err) = run(cli) {
        display_error(&err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), StoreError> {
    match cli.command {
        Commands::Cp(args) => cmd_cp(args),
        Commands::Ls(args) => cmd_ls(args),
        Commands::Stat(args) => cmd_stat(args),
        Commands::Rm(args) => cmd_rm(args),
    }
}

/// Resolve connection parameters for a locator and open the store.
fn open_store(loc: &SshLocator, connect: &ConnectArgs) -> Result<SshStore, StoreError> {
    let ssh_config = SshClientConfig::load_default();
    let resolver = ConnectionResolver::with_defaults(&ssh_config);

    let mut opts: ResolveOptions = connect.to_options(&loc.host, loc.user.as_deref(), loc.port);
    if connect.known_hosts {
        opts.host_key_policy = Some(Arc::new(KnownHostsPolicy::default_path()?));
    }

    let params = resolver.resolve(&opts)?;
    Ok(SshStore::new(params))
}

fn parse_remote(input: &str) -> Result<SshLocator, StoreError> {
    match locator::parse(input)? {
        Location::Ssh(loc) => Ok(loc),
        Location::Local { .. } => Err(StoreError::InvalidLocator {
            input: input.to_string(),
            reason: "expected an ssh:// locator".to_string(),
        }),
    }
}

fn cmd_cp(args: CpArgs) -> Result<(), StoreError> {
    let source = locator::parse(&args.source)?;
    let dest = locator::parse(&args.dest)?;

    match (source, dest) {
        (Location::Local { path: src }, Location::Ssh(loc)) => {
            let store = open_store(&loc, &args.connect)?;
            let size = std::fs::metadata(&src).map(|m| m.len()).unwrap_or(0);
            let bar = transfer_bar(size);

            let local = LocalStore::new();
            let reader = local.open_read(&src)?;
            let mut reader = ProgressReader::new(reader, bar.clone());
            let bytes = store.upload(&mut reader, &loc.path)?;

            bar.finish_and_clear();
            println!("{} -> {} ({})", src.display(), store.url_for(&loc.path), ByteSize(bytes));
            Ok(())
        }
        (Location::Ssh(loc), Location::Local { path: dst }) => {
            let store = open_store(&loc, &args.connect)?;
            let mut reader = store.open_read(&loc.path)?;

            let local = LocalStore::new();
            if let Some(parent) = dst.parent() {
                if !parent.as_os_str().is_empty() {
                    local.create_dir_all(parent)?;
                }
            }
            let bytes = local.upload(&mut *reader, &dst)?;
            println!("{} -> {} ({})", store.url_for(&loc.path), dst.display(), ByteSize(bytes));
            Ok(())
        }
        (Location::Ssh(src_loc), Location::Ssh(dst_loc)) => {
            // Remote-to-remote goes through this process.
            let src_store = open_store(&src_loc, &args.connect)?;
            let dst_store = open_store(&dst_loc, &args.connect)?;
            let mut reader = src_store.open_read(&src_loc.path)?;
            let bytes = dst_store.upload(&mut *reader, &dst_loc.path)?;
            println!(
                "{} -> {} ({})",
                src_store.url_for(&src_loc.path),
                dst_store.url_for(&dst_loc.path),
                ByteSize(bytes)
            );
            Ok(())
        }
        (Location::Local { .. }, Location::Local { .. }) => Err(StoreError::InvalidLocator {
            input: args.dest,
            reason: "at least one side must be an ssh:// locator".to_string(),
        }),
    }
}

fn cmd_ls(args: RemoteArgs) -> Result<(), StoreError> {
    let loc = parse_remote(&args.locator)?;
    let store = open_store(&loc, &args.connect)?;

    let mut entries = store.list_dir(&loc.path)?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    for entry in entries {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.path.display().to_string());
        let kind = if entry.stat.is_dir { "d" } else { "-" };
        println!("{} {:>10}  {}", kind, ByteSize(entry.stat.size).to_string(), name);
    }
    Ok(())
}

fn cmd_stat(args: RemoteArgs) -> Result<(), StoreError> {
    let loc = parse_remote(&args.locator)?;
    let store = open_store(&loc, &args.connect)?;

    let stat = store.stat(&loc.path)?;
    println!("{}", store.url_for(&loc.path));
    println!("  type: {}", if stat.is_dir { "directory" } else { "file" });
    println!("  size: {}", ByteSize(stat.size));
    if let Some(perm) = stat.permissions {
        println!("  mode: {:o}", perm & 0o7777);
    }
    Ok(())
}

fn cmd_rm(args: RemoteArgs) -> Result<(), StoreError> {
    let loc = parse_remote(&args.locator)?;
    let store = open_store(&loc, &args.connect)?;

    if !store.exists(&loc.path)? {
        return Err(StoreError::NotFound {
            path: loc.path.clone(),
        });
    }
    store.remove_file(&loc.path)?;
    println!("removed {}", store.url_for(&loc.path));
    Ok(())
}

fn display_error(err: &StoreError) {
    eprintln!("Error: {}", err);
    if let Some(suggestion) = err.suggestion() {
        eprintln!("  hint: {}", suggestion);
    }
}
