//! `ssh://` locator parsing and reconstruction.
//!
//! Remote objects are addressed as `ssh://[user@]host[:port]/path`; any
//! input without that scheme is a local path.

use std::path::PathBuf;

use url::Url;

use crate::config::params::DEFAULT_PORT;
use crate::error::StoreError;

/// Where one side of a transfer lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Local { path: PathBuf },
    Ssh(SshLocator),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SshLocator {
    pub host: String,
    /// None when the locator carries no port; the resolver's precedence
    /// chain (explicit > ssh config > 22) then decides.
    pub port: Option<u16>,
    pub user: Option<String>,
    pub path: PathBuf,
}

/// Classify a raw input string as an SSH locator or a local path.
pub fn parse(input: &str) -> Result<Location, StoreError> {
    if !input.starts_with("ssh://") {
        return Ok(Location::Local {
            path: PathBuf::from(input),
        });
    }

    let url = Url::parse(input).map_err(|e| StoreError::InvalidLocator {
        input: input.to_string(),
        reason: e.to_string(),
    })?;

    let host = url
        .host_str()
        .ok_or_else(|| StoreError::InvalidLocator {
            input: input.to_string(),
            reason: "missing host".to_string(),
        })?
        .to_string();

    let user = if url.username().is_empty() {
        None
    } else {
        Some(url.username().to_string())
    };

    Ok(Location::Ssh(SshLocator {
        host,
        port: url.port(),
        user,
        path: PathBuf::from(url.path()),
    }))
}

/// Rebuild the canonical locator for a remote path, stripping the path's
/// leading separator before reconstruction.
pub fn format(host: &str, port: u16, path: &std::path::Path) -> String {
    let path = path.to_string_lossy();
    format!("ssh://{}:{}/{}", host, port, path.trim_start_matches('/'))
}

impl SshLocator {
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}
