//! Database layer - store configuration, allow-lists, and connection pools
//!
//! # Design Principles
//!
//! - One bounded pool per logical store, never shared between stores
//! - Handles are scoped: dropping one returns it to its pool
//! - Credentials are injected at startup and never logged

pub mod config;
pub mod pool;
pub mod schema;

pub use config::{Backend, ConfigError, ConnectionConfig, PoolSettings, Store};
pub use pool::{ConnectionHandle, ConnectionManager, PoolStats};
