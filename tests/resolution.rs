//! End-to-end resolution scenarios: layered precedence plus the memoized
//! prompt cache, driven through the public resolver API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sshstore::config::params::ResolveOptions;
use sshstore::config::resolver::ConnectionResolver;
use sshstore::config::secrets::SecretPromptCache;
use sshstore::config::ssh_config::SshClientConfig;

fn opts(host: &str) -> ResolveOptions {
    ResolveOptions {
        host: Some(host.to_string()),
        ..ResolveOptions::default()
    }
}

#[test]
fn full_precedence_chain_for_one_host() {
    let config = SshClientConfig::parse(
        "Host build\n\
         Hostname build.internal.example\n\
         User ci\n\
         Port 2200\n\
         IdentityFile /keys/ci_ed25519\n\
         ProxyCommand ssh bastion -W %h:%p\n",
    );
    let cache = SecretPromptCache::with_prompter(Box::new(|_| unreachable!("no ask flags set")));
    let resolver = ConnectionResolver::new(&config, &cache);

    // Config supplies everything it can.
    let params = resolver.resolve(&opts("build")).unwrap();
    assert_eq!(params.host, "build.internal.example");
    assert_eq!(params.username, "ci");
    assert_eq!(params.port, 2200);
    assert_eq!(params.private_key_paths, vec![std::path::PathBuf::from("/keys/ci_ed25519")]);
    assert!(params.proxy_command.is_some());

    // Explicit options beat all of it.
    let mut explicit = opts("build");
    explicit.user = Some("override".to_string());
    explicit.port = Some(2222);
    explicit.keyfile = Some("/tmp/other_key".into());
    let params = resolver.resolve(&explicit).unwrap();
    assert_eq!(params.username, "override");
    assert_eq!(params.port, 2222);
    assert_eq!(params.private_key_paths, vec![std::path::PathBuf::from("/tmp/other_key")]);
}

#[test]
fn concurrent_password_resolutions_share_one_prompt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    let cache = Arc::new(SecretPromptCache::with_prompter(Box::new(move |_| {
        calls2.fetch_add(1, Ordering::SeqCst);
        // Slow prompt widens the race window.
        std::thread::sleep(std::time::Duration::from_millis(30));
        Ok("secret1".to_string())
    })));
    let config = Arc::new(SshClientConfig::empty());

    let mut handles = Vec::new();
    for _ in 0..6 {
        let cache = cache.clone();
        let config = config.clone();
        handles.push(std::thread::spawn(move || {
            let resolver = ConnectionResolver::new(&config, &cache);
            let mut o = opts("h");
            o.user = Some("u".to_string());
            o.ask_password = true;
            resolver.resolve(&o).unwrap().password
        }));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap().as_deref(), Some("secret1"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "terminal prompted more than once");
}

#[test]
fn parameters_are_independent_per_resolution() {
    let config = SshClientConfig::empty();
    let cache = SecretPromptCache::with_prompter(Box::new(|_| Ok("x".to_string())));
    let resolver = ConnectionResolver::new(&config, &cache);

    let mut o = opts("h");
    o.user = Some("u".to_string());
    let a = resolver.resolve(&o).unwrap();
    let b = resolver.resolve(&o).unwrap();

    // Two resolutions produce two records; neither aliases the other.
    assert_eq!(a.host, b.host);
    assert_eq!(a.port, b.port);
}
