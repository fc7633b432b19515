pub mod atomic;
pub mod progress;
