//! Catalog endpoints: users and products

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::fetch_records;
use crate::db::Store;
use crate::http::error::ApiError;
use crate::models::{RecordId, SearchName};
use crate::query::{Operator, QuerySpec, Record};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
}

/// GET /user?id= - users with the given id
async fn get_user(
    State(state): State<AppState>,
    params: Result<Query<UserParams>, QueryRejection>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let Query(params) = params?;
    let id = RecordId::parse("id", params.id.as_deref().unwrap_or_default())?;

    let spec = QuerySpec::select("users").filter("id", Operator::Eq, id.get());
    fetch_records(&state, Store::Catalog, spec).await
}

/// GET /search?name= - products with exactly this name
async fn search_products(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let Query(params) = params?;
    let name = SearchName::new(params.name.as_deref().unwrap_or_default())?;

    let spec = QuerySpec::select("products").filter("name", Operator::Eq, name.into_string());
    fetch_records(&state, Store::Catalog, spec).await
}

/// Catalog routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", get(get_user))
        .route("/search", get(search_products))
}
