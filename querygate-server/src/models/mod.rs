//! Request-level models with validation at construction
//!
//! Handlers turn raw request text into these types before any query is
//! described. Invalid input returns ValidationError, not panic.

pub mod params;
pub mod validation;

pub use params::{RecordId, SearchName, TxnId};
pub use validation::ValidationError;
