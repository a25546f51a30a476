use axum::{
    extract::{Path, State},
    Json,
};

use crate::domain::Transaction;
use crate::error::AppError;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/transactions/{id}",
    params(("id" = i64, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Stored transaction", body = Transaction),
        (status = 404, description = "Transaction not found")
    ),
    tag = "Transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let txn = state.payments.get(id).await?;
    Ok(Json(txn))
}

/// Polls the provider once for a transaction still in PENDING.
#[utoipa::path(
    post,
    path = "/transactions/{id}/finalize",
    params(("id" = i64, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction after the poll", body = Transaction),
        (status = 404, description = "Transaction or its route not found"),
        (status = 409, description = "Transaction is not pending")
    ),
    tag = "Transactions"
)]
pub async fn finalize_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let txn = state.payments.finalize(id).await?;
    tracing::info!(txn_id = id, status = %txn.status, "Manual finalize completed");
    Ok(Json(txn))
}
