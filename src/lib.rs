pub mod config;
pub mod monitor;
pub mod notifications;
pub mod store;
pub mod version;
