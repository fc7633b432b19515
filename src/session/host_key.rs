//! Pluggable host-key verification strategies.
//!
//! The default [`AutoAcceptPolicy`] accepts any host key and persists
//! nothing, mirroring an auto-add client policy. [`KnownHostsPolicy`] is the
//! richer strategy: it checks the key against `~/.ssh/known_hosts`, refuses
//! mismatches outright, and on first contact asks for confirmation with a
//! single blocking line read before persisting the key.

use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use ssh2::{CheckResult, HashType, KnownHostFileKind, Session};

use crate::error::StoreError;

pub trait HostKeyPolicy: fmt::Debug + Send + Sync {
    /// Short name for logs and Debug output.
    fn name(&self) -> &'static str;

    /// Called once after the SSH handshake, before authentication.
    fn verify(&self, session: &Session, host: &str, port: u16) -> Result<(), StoreError>;
}

/// Accept any host key without persisting it. No known-hosts store is
/// consulted or written; the fingerprint is only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAcceptPolicy;

impl HostKeyPolicy for AutoAcceptPolicy {
    fn name(&self) -> &'static str {
        "auto-accept"
    }

    fn verify(&self, session: &Session, host: &str, port: u16) -> Result<(), StoreError> {
        tracing::debug!(
            "Accepting host key for {}:{} without verification ({})",
            host,
            port,
            fingerprint(session)
        );
        Ok(())
    }
}

/// Verify against the user's known-hosts file, trust-on-first-use.
#[derive(Debug, Clone)]
pub struct KnownHostsPolicy {
    path: PathBuf,
}

impl KnownHostsPolicy {
    /// Policy over `~/.ssh/known_hosts`.
    pub fn default_path() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or_else(|| StoreError::Config {
            field: "home directory".to_string(),
        })?;
        Ok(Self {
            path: home.join(".ssh").join("known_hosts"),
        })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HostKeyPolicy for KnownHostsPolicy {
    fn name(&self) -> &'static str {
        "known-hosts"
    }

    fn verify(&self, session: &Session, host: &str, port: u16) -> Result<(), StoreError> {
        let (key_bytes, key_type) = session.host_key().ok_or_else(|| StoreError::HostKey {
            host: host.to_string(),
            reason: "server did not provide a host key during handshake".to_string(),
        })?;

        let mut known_hosts = session.known_hosts().map_err(|e| StoreError::HostKey {
            host: host.to_string(),
            reason: format!("could not initialise known-hosts store: {}", e),
        })?;

        // Missing file is expected for first-time users; check() then
        // reports NotFound and the TOFU prompt below handles it.
        let file_loaded = known_hosts
            .read_file(&self.path, KnownHostFileKind::OpenSSH)
            .is_ok();

        match known_hosts.check_port(host, port, key_bytes) {
            CheckResult::Match => {
                tracing::debug!("Host key verified for {}:{}", host, port);
                Ok(())
            }

            CheckResult::Mismatch => Err(StoreError::HostKey {
                host: host.to_string(),
                reason: format!(
                    "stored key does not match the server's current key ({}). Refusing \
                     connection; if the key legitimately changed, remove the old entry \
                     from {} and reconnect",
                    fingerprint(session),
                    self.path.display()
                ),
            }),

            CheckResult::NotFound => {
                eprintln!("The authenticity of host '{}' can't be established.", host);
                eprintln!("Server's key fingerprint: {}", fingerprint(session));
                eprint!("Are you sure you want to continue connecting (yes/no)? ");
                std::io::stderr().flush().ok();

                let answer = std::io::stdin()
                    .lock()
                    .lines()
                    .next()
                    .and_then(|l| l.ok())
                    .unwrap_or_default();
                if !answer.trim().eq_ignore_ascii_case("yes") {
                    return Err(StoreError::HostKey {
                        host: host.to_string(),
                        reason: "host key not accepted by user".to_string(),
                    });
                }

                if let Err(e) = known_hosts.add(host, key_bytes, host, key_type.into()) {
                    tracing::warn!("Could not record host key for '{}': {}", host, e);
                }
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                match known_hosts.write_file(&self.path, KnownHostFileKind::OpenSSH) {
                    Ok(()) => eprintln!(
                        "Warning: Permanently added '{}' to the list of known hosts.",
                        host
                    ),
                    Err(e) => tracing::warn!(
                        "Could not write known_hosts file '{}': {}",
                        self.path.display(),
                        e
                    ),
                }
                Ok(())
            }

            CheckResult::Failure => {
                // Benign when the file has never been created; the key will
                // be recorded on a later connection.
                if !file_loaded {
                    tracing::warn!(
                        "No known_hosts file at '{}'; proceeding without verification for '{}'",
                        self.path.display(),
                        host
                    );
                } else {
                    tracing::warn!("Host key check failed for '{}'; proceeding with caution", host);
                }
                Ok(())
            }
        }
    }
}

/// The server's host key hash in OpenSSH display form (`SHA256:` plus
/// unpadded base64), falling back to MD5 hex when SHA-256 is unavailable.
fn fingerprint(session: &Session) -> String {
    if let Some(hash) = session.host_key_hash(HashType::Sha256) {
        format!("SHA256:{}", STANDARD_NO_PAD.encode(hash))
    } else if let Some(hash) = session.host_key_hash(HashType::Md5) {
        let hex: Vec<String> = hash.iter().map(|b| format!("{:02x}", b)).collect();
        format!("MD5:{}", hex.join(":"))
    } else {
        "(fingerprint unavailable)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_accept_is_the_default_name() {
        assert_eq!(AutoAcceptPolicy.name(), "auto-accept");
    }

    #[test]
    fn known_hosts_policy_keeps_its_path() {
        let policy = KnownHostsPolicy::at(PathBuf::from("/tmp/kh"));
        assert_eq!(policy.name(), "known-hosts");
        assert_eq!(policy.path, PathBuf::from("/tmp/kh"));
    }
}
