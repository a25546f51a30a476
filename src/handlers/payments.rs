use axum::{extract::State, Json};

use crate::domain::TxnKind;
use crate::error::AppError;
use crate::services::{PaymentRequest, PaymentResponse};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/payment",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Transaction created", body = PaymentResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Gateway or channel not found"),
        (status = 500, description = "Persistence failure")
    ),
    tag = "Transactions"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let response = state.payments.create(TxnKind::Payment, request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/payout",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Transaction created", body = PaymentResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Gateway or channel not found"),
        (status = 500, description = "Persistence failure")
    ),
    tag = "Transactions"
)]
pub async fn create_payout(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let response = state.payments.create(TxnKind::Payout, request).await?;
    Ok(Json(response))
}
