//! Route handlers organized by store
//!
//! Handlers only check request shape and describe the query. They never
//! name a table or column from request text and never assemble SQL.

pub mod catalog;
pub mod health;
pub mod payments;

use axum::Json;

use crate::db::Store;
use crate::error::QueryError;
use crate::http::error::ApiError;
use crate::query::{build, QuerySpec, Record};
use crate::state::AppState;

/// Compile and run a read, returning its records as the response body.
pub(crate) async fn fetch_records(
    state: &AppState,
    store: Store,
    spec: QuerySpec,
) -> Result<Json<Vec<Record>>, ApiError> {
    let statement = build(store, spec)?;
    let rows = state
        .executor()
        .execute(&statement)
        .await?
        .into_rows()
        .ok_or(QueryError::Unknown)?;

    Ok(Json(rows))
}
