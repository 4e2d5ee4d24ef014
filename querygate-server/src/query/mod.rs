//! Query construction and execution
//!
//! - `spec`: structured description of an intended operation
//! - `builder`: allow-list validation and compilation to a bound statement
//! - `executor`: pooled execution with timeout and error mapping
//! - `result`: row decoding into JSON records

pub mod builder;
pub mod executor;
pub mod result;
pub mod spec;

pub use builder::{build, PreparedStatement};
pub use executor::Executor;
pub use result::{QueryResult, Record};
pub use spec::{Assignment, Operation, Operator, Predicate, QuerySpec, Value};
