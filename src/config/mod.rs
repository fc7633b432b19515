pub mod params;
pub mod resolver;
pub mod secrets;
pub mod ssh_config;
