//! Process-wide memoized cache for interactively prompted secrets.
//!
//! A user is asked at most once per `(host, user, port, kind)` for the
//! lifetime of the process, and prompting is serialized under a single lock
//! so concurrent connections never interleave their prompts on the terminal.
//!
//! A declined prompt (end-of-input, non-interactive run) is cached exactly
//! like a real value so the user is not asked again.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Which secret a prompt is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    Password,
    Passphrase,
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretKind::Password => write!(f, "password"),
            SecretKind::Passphrase => write!(f, "passphrase"),
        }
    }
}

type SecretKey = (String, String, u16, SecretKind);

/// The prompting function: takes the prompt text, returns the secret.
/// An `Err` is treated as the user declining.
pub type Prompter = Box<dyn FnMut(&str) -> io::Result<String> + Send>;

struct CacheState {
    entries: HashMap<SecretKey, Option<String>>,
    prompter: Prompter,
}

/// Memoized prompt cache. Holding the internal mutex across the blocking
/// prompt is what guarantees both at-most-one-prompt per key and
/// non-interleaved terminal output.
pub struct SecretPromptCache {
    state: Mutex<CacheState>,
}

impl SecretPromptCache {
    /// Cache backed by a real terminal prompt.
    pub fn new() -> Self {
        Self::with_prompter(Box::new(|prompt| rpassword::prompt_password(prompt)))
    }

    /// Cache with an injected prompter, for tests and embedding.
    pub fn with_prompter(prompter: Prompter) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                prompter,
            }),
        }
    }

    /// The single process-wide cache shared by all store instances.
    pub fn global() -> &'static SecretPromptCache {
        static GLOBAL: OnceLock<SecretPromptCache> = OnceLock::new();
        GLOBAL.get_or_init(SecretPromptCache::new)
    }

    /// Return the cached secret for this key, prompting on first use.
    ///
    /// `None` means the user declined (now or on a previous call). This
    /// never errors or panics: a failed terminal read is a decline.
    pub fn get_or_prompt(
        &self,
        host: &str,
        username: &str,
        port: u16,
        kind: SecretKind,
    ) -> Option<String> {
        let mut state = self.lock();

        let key = (host.to_string(), username.to_string(), port, kind);
        if let Some(cached) = state.entries.get(&key) {
            return cached.clone();
        }

        let prompt = format!(
            "Enter a {} for host '{}' port '{}' user '{}': ",
            kind, host, port, username
        );
        let result = match (state.prompter)(&prompt) {
            Ok(secret) => Some(secret),
            Err(e) => {
                tracing::debug!("Secret prompt declined ({}): {}", kind, e);
                None
            }
        };

        state.entries.insert(key, result.clone());
        result
    }

    /// A prompting thread that panicked leaves nothing half-written in the
    /// map, so a poisoned lock is safe to recover.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for SecretPromptCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_cache(counter: Arc<AtomicUsize>, reply: &'static str) -> SecretPromptCache {
        SecretPromptCache::with_prompter(Box::new(move |_prompt| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(reply.to_string())
        }))
    }

    #[test]
    fn second_lookup_hits_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(calls.clone(), "s3cret");

        let first = cache.get_or_prompt("h", "u", 22, SecretKind::Password);
        let second = cache.get_or_prompt("h", "u", 22, SecretKind::Password);

        assert_eq!(first.as_deref(), Some("s3cret"));
        assert_eq!(second.as_deref(), Some("s3cret"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_kinds_prompt_separately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(calls.clone(), "x");

        cache.get_or_prompt("h", "u", 22, SecretKind::Password);
        cache.get_or_prompt("h", "u", 22, SecretKind::Passphrase);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn declined_prompt_is_sticky() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let cache = SecretPromptCache::with_prompter(Box::new(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"))
        }));

        assert_eq!(cache.get_or_prompt("h", "u", 22, SecretKind::Password), None);
        assert_eq!(cache.get_or_prompt("h", "u", 22, SecretKind::Password), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_lookups_prompt_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(counting_cache(calls.clone(), "secret1"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                cache.get_or_prompt("h", "u", 22, SecretKind::Password)
            }));
        }
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("secret1"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prompt_text_names_kind_host_port_user() {
        let seen = Arc::new(Mutex::new(String::new()));
        let seen2 = seen.clone();
        let cache = SecretPromptCache::with_prompter(Box::new(move |prompt| {
            *seen2.lock().unwrap() = prompt.to_string();
            Ok("v".to_string())
        }));

        cache.get_or_prompt("example.com", "alice", 2222, SecretKind::Passphrase);

        let prompt = seen.lock().unwrap().clone();
        assert!(prompt.contains("passphrase"));
        assert!(prompt.contains("example.com"));
        assert!(prompt.contains("2222"));
        assert!(prompt.contains("alice"));
    }
}
