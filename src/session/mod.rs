pub mod factory;
pub mod host_key;
