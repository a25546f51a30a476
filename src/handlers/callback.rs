use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
};

use crate::error::AppError;
use crate::services::Dispatch;
use crate::AppState;

/// Accepts a provider notification. Processing continues in the background
/// once the transaction it refers to has been found.
#[utoipa::path(
    post,
    path = "/callback/{provider}",
    params(("provider" = String, Path, description = "Adapter key, e.g. paylink")),
    request_body(content = String, description = "Raw provider notification", content_type = "application/json"),
    responses(
        (status = 200, description = "Callback accepted", body = String),
        (status = 400, description = "Unknown provider, method or malformed body"),
        (status = 403, description = "Source IP not allowed"),
        (status = 500, description = "Persistence failure")
    ),
    tag = "Callbacks"
)]
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    method: Method,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    match state.callbacks.dispatch(&provider, &method, body).await {
        Ok(Dispatch::Skipped) | Ok(Dispatch::Accepted { .. }) => Ok((StatusCode::OK, "OK")),
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "Callback rejected");
            Err(e.into())
        }
    }
}
