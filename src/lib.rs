//! SSH-backed object store: list, read, and atomically upload remote files.
//!
//! Connection parameters come from a layered configuration (explicit
//! options, `~/.ssh/config`, defaults, interactive prompting); every upload
//! goes through a temp-then-atomic-rename protocol so a destination is
//! never observable half-written.

pub mod cli;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod transfer;

pub use error::StoreError;
