//! Infrastructure layer: credential store, log queue, services, config.

pub mod auth_flow;
pub mod config;
pub mod directory;
pub mod event_bus;
pub mod log_forwarder;
pub mod store;

pub use auth_flow::{AuthError, AuthFlow};
pub use config::{AppConfig, ConfigError};
pub use directory::{DirectoryError, UserDirectory};
pub use log_forwarder::LogForwarder;
pub use store::{InMemoryUserStore, PostgresUserStore, StoreError, UserChanges, UserStore};
