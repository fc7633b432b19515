//! The resolved, immutable connection-parameter record.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::session::host_key::{AutoAcceptPolicy, HostKeyPolicy};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default connection timeout: 30 minutes, sized for long bulk transfers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Fixed cipher preference, in priority order. Applied to both transport
/// directions before the handshake; compression is always left disabled.
pub const PREFERRED_ENCRYPTION_ALGS: [&str; 4] = [
    "aes128-gcm@openssh.com",
    "aes256-ctr",
    "aes192-ctr",
    "aes128-ctr",
];

/// Caller-supplied options, the highest-precedence configuration source.
///
/// Every field except `host` is optional; the resolver fills gaps from the
/// personal SSH config and built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub passphrase: Option<String>,
    /// Prompt for the password when none was supplied.
    pub ask_password: bool,
    /// Prompt for the key passphrase when none was supplied.
    pub ask_passphrase: bool,
    /// Explicit private key file; takes full precedence over the personal
    /// config's IdentityFile list (never merged).
    pub keyfile: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub gss_auth: Option<bool>,
    pub agent_forwarding: Option<bool>,
    pub max_sessions: Option<u32>,
    /// Substitute host-key verification strategy; defaults to auto-accept.
    pub host_key_policy: Option<Arc<dyn HostKeyPolicy>>,
}

/// Complete connection parameters for one store instance.
///
/// Built once by the resolver and never mutated afterwards; a new store
/// instance builds its own.
#[derive(Clone)]
pub struct ConnectionParameters {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub password: Option<String>,
    pub passphrase: Option<String>,
    pub private_key_paths: Vec<PathBuf>,
    pub timeout: Duration,
    pub encryption_algs: &'static [&'static str],
    pub compression: bool,
    pub gss_auth: bool,
    pub agent_forwarding: bool,
    pub proxy_command: Option<String>,
    pub max_sessions: Option<u32>,
    pub host_key_policy: Arc<dyn HostKeyPolicy>,
}

impl ConnectionParameters {
    /// Parameters with every non-required field at its default, used as the
    /// starting point by the resolver.
    pub(crate) fn defaults(host: String, username: String) -> Self {
        Self {
            host,
            username,
            port: DEFAULT_PORT,
            password: None,
            passphrase: None,
            private_key_paths: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            encryption_algs: &PREFERRED_ENCRYPTION_ALGS,
            compression: false,
            gss_auth: false,
            agent_forwarding: true,
            proxy_command: None,
            max_sessions: None,
            host_key_policy: Arc::new(AutoAcceptPolicy),
        }
    }
}

// Manual Debug so secrets never reach logs.
impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("private_key_paths", &self.private_key_paths)
            .field("timeout", &self.timeout)
            .field("encryption_algs", &self.encryption_algs)
            .field("compression", &self.compression)
            .field("gss_auth", &self.gss_auth)
            .field("agent_forwarding", &self.agent_forwarding)
            .field("proxy_command", &self.proxy_command)
            .field("max_sessions", &self.max_sessions)
            .field("host_key_policy", &self.host_key_policy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let params = ConnectionParameters::defaults("h".into(), "u".into());
        assert_eq!(params.port, 22);
        assert_eq!(params.timeout, Duration::from_secs(1800));
        assert!(!params.compression);
        assert!(!params.gss_auth);
        assert!(params.agent_forwarding);
        assert!(params.private_key_paths.is_empty());
        assert_eq!(params.encryption_algs[0], "aes128-gcm@openssh.com");
        assert_eq!(params.encryption_algs.len(), 4);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut params = ConnectionParameters::defaults("h".into(), "u".into());
        params.password = Some("hunter2".into());
        params.passphrase = Some("opensesame".into());
        let rendered = format!("{:?}", params);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("opensesame"));
        assert!(rendered.contains("<redacted>"));
    }
}
