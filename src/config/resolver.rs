//! Layered resolution of connection parameters.
//!
//! Per field, the first source that yields a value wins:
//! explicit caller options, then the personal SSH config entry for the
//! queried host, then built-in defaults. Missing secrets are delegated to
//! the [`SecretPromptCache`] when the corresponding ask flag is set.
//!
//! The only fatal gap is a missing host; every other field has a defined
//! fallback, and malformed personal-config values (e.g. a non-numeric port)
//! are treated as absent rather than errors.

use crate::config::params::{ConnectionParameters, ResolveOptions};
use crate::config::secrets::{SecretKind, SecretPromptCache};
use crate::config::ssh_config::{expand_tilde, SshClientConfig};
use crate::error::StoreError;

pub struct ConnectionResolver<'a> {
    ssh_config: &'a SshClientConfig,
    secrets: &'a SecretPromptCache,
}

impl<'a> ConnectionResolver<'a> {
    pub fn new(ssh_config: &'a SshClientConfig, secrets: &'a SecretPromptCache) -> Self {
        Self { ssh_config, secrets }
    }

    /// Resolver over the process-wide defaults: `~/.ssh/config` (or nothing)
    /// and the global prompt cache.
    pub fn with_defaults(ssh_config: &'a SshClientConfig) -> Self {
        Self::new(ssh_config, SecretPromptCache::global())
    }

    pub fn resolve(&self, opts: &ResolveOptions) -> Result<ConnectionParameters, StoreError> {
        let queried_host = opts.host.clone().ok_or_else(|| StoreError::Config {
            field: "host".to_string(),
        })?;

        // The config entry is scoped by the name the caller supplied; a
        // Hostname directive then replaces it as the address to dial.
        let entry = self.ssh_config.lookup(&queried_host);
        let host = entry.hostname.clone().unwrap_or(queried_host);

        let username = opts
            .user
            .clone()
            .or_else(|| entry.user.clone())
            .or_else(local_username)
            .ok_or_else(|| StoreError::Config {
                field: "username".to_string(),
            })?;

        // Port 0 is outside the valid range; an explicit zero falls through
        // to the next source just like a malformed config value.
        let port = opts
            .port
            .filter(|p| *p != 0)
            .or_else(|| parse_port(entry.port.as_deref()))
            .unwrap_or(crate::config::params::DEFAULT_PORT);

        let mut params = ConnectionParameters::defaults(host, username);
        params.port = port;

        params.password = opts.password.clone().or_else(|| {
            if opts.ask_password {
                self.secrets.get_or_prompt(
                    &params.host,
                    &params.username,
                    params.port,
                    SecretKind::Password,
                )
            } else {
                None
            }
        });
        params.passphrase = opts.passphrase.clone().or_else(|| {
            if opts.ask_passphrase {
                self.secrets.get_or_prompt(
                    &params.host,
                    &params.username,
                    params.port,
                    SecretKind::Passphrase,
                )
            } else {
                None
            }
        });

        // An explicit keyfile replaces the config list entirely; both
        // sources get tilde expansion.
        params.private_key_paths = match &opts.keyfile {
            Some(keyfile) => vec![expand_tilde(&keyfile.to_string_lossy())],
            None => entry
                .identity_files
                .iter()
                .map(|p| expand_tilde(p))
                .collect(),
        };

        if let Some(timeout) = opts.timeout {
            params.timeout = timeout;
        }
        if let Some(gss) = opts.gss_auth {
            params.gss_auth = gss;
        }
        if let Some(forwarding) = opts.agent_forwarding {
            params.agent_forwarding = forwarding;
        }
        params.proxy_command = entry.proxy_command.clone();
        params.max_sessions = opts.max_sessions;
        if let Some(policy) = &opts.host_key_policy {
            params.host_key_policy = policy.clone();
        }

        tracing::debug!(
            "Resolved connection parameters for {}@{}:{}",
            params.username,
            params.host,
            params.port
        );
        Ok(params)
    }
}

/// Parse a personal-config port value; anything malformed or out of range
/// falls through to the next source.
fn parse_port(raw: Option<&str>) -> Option<u16> {
    raw?.trim().parse::<u16>().ok().filter(|p| *p != 0)
}

/// The local OS account name, the last-resort username source.
fn local_username() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}
