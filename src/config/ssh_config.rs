//! Minimal lookup over the user's personal SSH client configuration.
//!
//! Only the handful of keys the resolver consumes are kept: `Hostname`,
//! `User`, `Port`, `IdentityFile` and `ProxyCommand`. Values follow OpenSSH
//! semantics: across all `Host` blocks matching the queried name, the first
//! value seen for a key wins, except `IdentityFile` which accumulates.
//!
//! A missing config file is a normal case and yields an empty mapping.

use std::path::{Path, PathBuf};

/// The per-host values extracted for one queried host name.
///
/// `port` is kept as the raw string; the resolver parses it tolerantly so a
/// malformed value falls through to the next source instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostEntry {
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<String>,
    pub identity_files: Vec<String>,
    pub proxy_command: Option<String>,
}

/// One parsed `Host` block: its patterns and the raw key/value pairs.
#[derive(Debug, Clone)]
struct HostBlock {
    patterns: Vec<String>,
    options: Vec<(String, String)>,
}

/// Parsed personal SSH configuration, queryable by host name.
#[derive(Debug, Clone, Default)]
pub struct SshClientConfig {
    blocks: Vec<HostBlock>,
}

impl SshClientConfig {
    /// An empty configuration: every lookup yields a default `HostEntry`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `~/.ssh/config` if it exists; absence yields an empty config.
    pub fn load_default() -> Self {
        let path = match dirs::home_dir() {
            Some(home) => home.join(".ssh").join("config"),
            None => return Self::empty(),
        };
        Self::load(&path)
    }

    /// Load a config file from an explicit path; absence or unreadable
    /// content yields an empty config, never an error.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("Could not read ssh config {}: {}", path.display(), e);
                }
                Self::empty()
            }
        }
    }

    /// Parse config text. Unknown keys are carried through; malformed lines
    /// are skipped.
    pub fn parse(contents: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current: Option<HostBlock> = None;

        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = match split_option(line) {
                Some(kv) => kv,
                None => continue,
            };

            if key.eq_ignore_ascii_case("host") {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                current = Some(HostBlock {
                    patterns: value.split_whitespace().map(str::to_string).collect(),
                    options: Vec::new(),
                });
            } else if let Some(block) = current.as_mut() {
                block.options.push((key, value));
            }
            // Options before any Host line apply globally in OpenSSH; the
            // resolver only consumes host-scoped values, so they are dropped.
        }

        if let Some(block) = current.take() {
            blocks.push(block);
        }

        Self { blocks }
    }

    /// Collect the values applying to `host` from all matching blocks.
    pub fn lookup(&self, host: &str) -> HostEntry {
        let mut entry = HostEntry::default();

        for block in &self.blocks {
            if !block.patterns.iter().any(|p| pattern_matches(p, host)) {
                continue;
            }
            for (key, value) in &block.options {
                match key.to_ascii_lowercase().as_str() {
                    "hostname" => {
                        entry.hostname.get_or_insert_with(|| value.clone());
                    }
                    "user" => {
                        entry.user.get_or_insert_with(|| value.clone());
                    }
                    "port" => {
                        entry.port.get_or_insert_with(|| value.clone());
                    }
                    "identityfile" => entry.identity_files.push(value.clone()),
                    "proxycommand" => {
                        entry.proxy_command.get_or_insert_with(|| value.clone());
                    }
                    _ => {}
                }
            }
        }

        entry
    }
}

/// Split an option line into (key, value); accepts `Key value` and `Key=value`.
fn split_option(line: &str) -> Option<(String, String)> {
    let idx = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let key = line[..idx].to_string();
    let value = line[idx..].trim_start_matches(|c: char| c.is_whitespace() || c == '=');
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, strip_quotes(value).to_string()))
}

fn strip_quotes(value: &str) -> &str {
    let v = value.trim();
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// OpenSSH-style host pattern match supporting `*` and `?` wildcards.
fn pattern_matches(pattern: &str, host: &str) -> bool {
    fn matches(p: &[u8], h: &[u8]) -> bool {
        match (p.first(), h.first()) {
            (None, None) => true,
            (Some(b'*'), _) => matches(&p[1..], h) || (!h.is_empty() && matches(p, &h[1..])),
            (Some(b'?'), Some(_)) => matches(&p[1..], &h[1..]),
            (Some(pc), Some(hc)) => pc.eq_ignore_ascii_case(hc) && matches(&p[1..], &h[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), host.as_bytes())
}

/// Expand a leading `~` or `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# comment
Host example
    Hostname real.example.com
    User deploy
    Port 2200
    IdentityFile ~/.ssh/id_example
    IdentityFile ~/.ssh/id_backup

Host *.internal
    User ops
    ProxyCommand ssh gateway -W %h:%p

Host example other
    User shadowed
    Port 9999
";

    #[test]
    fn lookup_exact_host() {
        let config = SshClientConfig::parse(SAMPLE);
        let entry = config.lookup("example");
        assert_eq!(entry.hostname.as_deref(), Some("real.example.com"));
        assert_eq!(entry.user.as_deref(), Some("deploy"));
        assert_eq!(entry.port.as_deref(), Some("2200"));
        assert_eq!(
            entry.identity_files,
            vec!["~/.ssh/id_example".to_string(), "~/.ssh/id_backup".to_string()]
        );
    }

    #[test]
    fn first_value_wins_across_blocks() {
        let config = SshClientConfig::parse(SAMPLE);
        let entry = config.lookup("example");
        // The later "Host example other" block also matches but must not
        // override User or Port already set by the first block.
        assert_eq!(entry.user.as_deref(), Some("deploy"));
        assert_eq!(entry.port.as_deref(), Some("2200"));
    }

    #[test]
    fn wildcard_pattern_matches() {
        let config = SshClientConfig::parse(SAMPLE);
        let entry = config.lookup("db1.internal");
        assert_eq!(entry.user.as_deref(), Some("ops"));
        assert!(entry.proxy_command.as_deref().unwrap().contains("gateway"));
    }

    #[test]
    fn unmatched_host_yields_empty_entry() {
        let config = SshClientConfig::parse(SAMPLE);
        assert_eq!(config.lookup("unrelated"), HostEntry::default());
    }

    #[test]
    fn equals_separator_accepted() {
        let config = SshClientConfig::parse("Host h\nUser=alice\nPort = 44\n");
        let entry = config.lookup("h");
        assert_eq!(entry.user.as_deref(), Some("alice"));
        assert_eq!(entry.port.as_deref(), Some("44"));
    }

    #[test]
    fn missing_file_is_empty_config() {
        let config = SshClientConfig::load(Path::new("/nonexistent/ssh/config"));
        assert_eq!(config.lookup("any"), HostEntry::default());
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(pattern_matches("host?", "host1"));
        assert!(!pattern_matches("host?", "host12"));
        assert!(pattern_matches("*", "anything"));
    }

    #[test]
    fn expand_tilde_leaves_plain_paths_alone() {
        assert_eq!(expand_tilde("/etc/keys"), PathBuf::from("/etc/keys"));
    }
}
