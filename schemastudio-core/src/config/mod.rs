//! Configuration types.
//!
//! - `ConnectionConfig`: pool sizing and session timeouts
//! - `ConnectionResolver`: layered connection-string resolution
//! - `QueryConfig` / `TableListOptions`: per-operation options
//!
//! # Security
//! These structs intentionally do NOT store passwords. A resolved
//! connection string lives only inside `ResolvedConnection`, which zeroes
//! it on drop.

mod connection;
mod options;
mod resolver;

pub use connection::ConnectionConfig;
pub use options::{QueryConfig, TableListOptions};
pub use resolver::{
    BoundConnection, ConnectionResolver, DEFAULT_SETTING, EnvSettings, LayeredSettings,
    PRIMARY_SETTING, ResolvedConnection, ResolvedFrom, SettingsSource,
};
