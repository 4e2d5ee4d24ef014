//! querygate-server: parameterized query construction and pooled execution
//!
//! Every request parameter travels the same path before it reaches a store:
//! validation, [`query::QuerySpec`], [`query::build`],
//! [`query::PreparedStatement`], [`query::Executor`].
//!
//! Identifiers (tables, columns) are checked against per-store allow-lists
//! and never come from request text. Values are always bound parameters.

pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod query;
pub mod state;

pub use error::QueryError;
pub use state::AppState;
