//! Payments endpoints: invoices and refunds

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::fetch_records;
use crate::db::Store;
use crate::error::QueryError;
use crate::http::error::ApiError;
use crate::models::{RecordId, TxnId};
use crate::query::{build, Operator, QuerySpec, Record};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InvoiceParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Refund request body
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    #[serde(rename = "txnId")]
    pub txn_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub success: bool,
}

/// GET /invoice?userId= - invoices for a user
async fn list_invoices(
    State(state): State<AppState>,
    params: Result<Query<InvoiceParams>, QueryRejection>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let Query(params) = params?;
    let user_id = RecordId::parse("userId", params.user_id.as_deref().unwrap_or_default())?;

    let spec = QuerySpec::select("invoices").filter("user_id", Operator::Eq, user_id.get());
    fetch_records(&state, Store::Payments, spec).await
}

/// POST /refund - mark one payment as refunded
///
/// Zero matching rows is reported as 404.
async fn refund(
    State(state): State<AppState>,
    payload: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<Json<RefundResponse>, ApiError> {
    let Json(req) = payload?;
    let txn_id = TxnId::new(req.txn_id.as_deref().unwrap_or_default())?;

    let spec = QuerySpec::update("payments")
        .set("status", "refunded")
        .filter("txn_id", Operator::Eq, txn_id.into_string());
    let statement = build(Store::Payments, spec)?;

    let affected = state
        .executor()
        .execute(&statement)
        .await?
        .affected()
        .ok_or(QueryError::Unknown)?;

    if affected == 0 {
        return Err(QueryError::NotFound.into());
    }

    tracing::info!(affected, "refund recorded");
    Ok(Json(RefundResponse { success: true }))
}

/// Payments routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoice", get(list_invoices))
        .route("/refund", post(refund))
}
