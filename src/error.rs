use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: required field '{field}' could not be resolved")]
    Config { field: String },

    #[error("Invalid locator '{input}': {reason}")]
    InvalidLocator { input: String, reason: String },

    #[error("Connection failed to ssh://{host}:{port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Transfer to {} failed: {source}", path.display())]
    Transfer {
        path: PathBuf,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Host key verification failed for {host}: {reason}")]
    HostKey { host: String, reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Wrap an underlying failure with the destination path it affected.
    ///
    /// Used by the upload path so a failed transfer always reports which
    /// destination was being written.
    pub fn transfer(path: &std::path::Path, source: StoreError) -> Self {
        StoreError::Transfer {
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    }

    /// Returns a user-friendly suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            StoreError::Config { .. } => {
                Some("Pass the missing value explicitly, e.g. --user or a host in the locator.")
            }
            StoreError::InvalidLocator { .. } => {
                Some("Expected ssh://[user@]host[:port]/path or a local path.")
            }
            StoreError::Connection { .. } => {
                Some("Check that the host is reachable and the port is correct.")
            }
            StoreError::HostKey { .. } => {
                Some("If the host key legitimately changed, update ~/.ssh/known_hosts.")
            }
            StoreError::NotFound { .. } => {
                Some("Check the path exists and spelling is correct.")
            }
            StoreError::PermissionDenied { .. } => {
                Some("Check file permissions on the remote side.")
            }
            _ => None,
        }
    }
}

impl From<url::ParseError> for StoreError {
    fn from(err: url::ParseError) -> Self {
        StoreError::InvalidLocator {
            input: String::new(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn config_error_names_the_field() {
        let err = StoreError::Config {
            field: "host".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("host"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn transfer_error_reports_destination_path() {
        let inner = StoreError::Io {
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        };
        let err = StoreError::transfer(Path::new("/data/obj"), inner);
        let msg = format!("{}", err);
        assert!(msg.contains("/data/obj"));
        assert!(msg.contains("pipe closed"));
    }

    #[test]
    fn connection_error_display() {
        let err = StoreError::Connection {
            host: "example.com".to_string(),
            port: 22,
            reason: "Connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ssh://example.com:22"));
        assert!(msg.contains("Connection refused"));
    }

    #[test]
    fn io_error_no_suggestion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io_err.into();
        assert!(err.suggestion().is_none());
    }
}
