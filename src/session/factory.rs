//! Builds a live, authenticated SSH session from resolved parameters.
//!
//! The factory owns the connection policy: cipher preference and disabled
//! compression are applied before the handshake, the configured host-key
//! strategy runs right after it, and authentication cascades through
//! explicit key files, the SSH agent, and finally a password.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use ssh2::{MethodType, Session};

use crate::config::params::ConnectionParameters;
use crate::error::StoreError;

pub fn connect(params: &ConnectionParameters) -> Result<Session, StoreError> {
    let connection_err = |reason: String| StoreError::Connection {
        host: params.host.clone(),
        port: params.port,
        reason,
    };

    if params.gss_auth {
        tracing::warn!("gss_auth requested but not supported by the embedded client; ignoring");
    }
    if let Some(proxy) = &params.proxy_command {
        tracing::warn!(
            "ProxyCommand '{}' is not supported by the embedded client; connecting directly",
            proxy
        );
    }

    let tcp = dial(&params.host, params.port, params.timeout).map_err(&connection_err)?;

    let mut session =
        Session::new().map_err(|e| connection_err(format!("failed to create SSH session: {}", e)))?;

    // Negotiation preferences must be set before the handshake.
    let ciphers = params.encryption_algs.join(",");
    session
        .method_pref(MethodType::CryptCs, &ciphers)
        .and_then(|_| session.method_pref(MethodType::CryptSc, &ciphers))
        .map_err(|e| connection_err(format!("failed to set cipher preference: {}", e)))?;
    session.set_compress(params.compression);

    let timeout_ms = params.timeout.as_millis().min(u128::from(u32::MAX)) as u32;
    session.set_timeout(timeout_ms);

    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| connection_err(format!("SSH handshake failed: {}", e)))?;

    params
        .host_key_policy
        .verify(&session, &params.host, params.port)?;

    authenticate(&session, params).map_err(connection_err)?;

    tracing::debug!(
        "Connected to {}@{}:{} (policy: {})",
        params.username,
        params.host,
        params.port,
        params.host_key_policy.name()
    );
    Ok(session)
}

/// Resolve the host name and establish the TCP connection with the
/// configured timeout.
fn dial(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, String> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("could not resolve '{}': {}", host, e))?;
    let addr = addrs
        .next()
        .ok_or_else(|| format!("'{}' resolved to no addresses", host))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("TCP connection failed: {}", e))?;
    tcp.set_nodelay(true).ok();
    Ok(tcp)
}

/// Authentication cascade: explicit key files (with passphrase), SSH agent,
/// password. Stops at the first method that authenticates.
fn authenticate(session: &Session, params: &ConnectionParameters) -> Result<(), String> {
    let user = &params.username;
    let mut tried = Vec::new();

    for key_path in &params.private_key_paths {
        if !key_path.exists() {
            tracing::debug!("Skipping missing key file {}", key_path.display());
            continue;
        }
        tried.push("key file");
        match session.userauth_pubkey_file(user, None, key_path, params.passphrase.as_deref()) {
            Ok(()) if session.authenticated() => {
                tracing::debug!("Authenticated via key file {}", key_path.display());
                return Ok(());
            }
            Ok(()) => {}
            Err(e) => {
                tracing::debug!("Key file {} rejected: {}", key_path.display(), e);
            }
        }
    }

    // The agent is always a candidate; `agent_forwarding` only governs
    // whether the agent is exposed to the remote side after login.
    tried.push("agent");
    if session.userauth_agent(user).is_ok() && session.authenticated() {
        tracing::debug!("Authenticated via SSH agent for {}@{}", user, params.host);
        return Ok(());
    }

    if let Some(password) = &params.password {
        tried.push("password");
        match session.userauth_password(user, password) {
            Ok(()) if session.authenticated() => {
                tracing::debug!("Authenticated via password for {}@{}", user, params.host);
                return Ok(());
            }
            Ok(()) => {}
            Err(e) => tracing::debug!("Password authentication failed: {}", e),
        }
    }

    Err(format!(
        "authentication failed for user '{}'; tried: {}",
        user,
        tried.join(", ")
    ))
}
