pub mod callback;
pub mod payments;
pub mod transactions;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_pool: Option<DbPoolStats>,
    /// Circuit breaker state per gateway used since startup.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gateways: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
    pub usage_percent: f32,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthStatus),
        (status = 503, description = "Service is unhealthy", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (db_status, db_pool) = match &state.db {
        Some(pool) => {
            let status = match sqlx::query("SELECT 1").execute(pool).await {
                Ok(_) => "connected",
                Err(_) => "disconnected",
            };
            let active_connections = pool.size();
            let max_connections = pool.options().get_max_connections();
            let stats = DbPoolStats {
                active_connections,
                idle_connections: pool.num_idle() as u32,
                max_connections,
                usage_percent: (active_connections as f32 / max_connections.max(1) as f32)
                    * 100.0,
            };
            (status, Some(stats))
        }
        None => ("in-memory", None),
    };

    let healthy = db_status != "disconnected";
    let health_response = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
        db_pool,
        gateways: state
            .payments
            .registry()
            .circuit_states()
            .into_iter()
            .map(|(gateway, circuit)| (gateway, circuit.to_string()))
            .collect(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        payments::create_payment,
        payments::create_payout,
        callback::callback,
        transactions::get_transaction,
        transactions::finalize_transaction,
    ),
    components(schemas(
        HealthStatus,
        DbPoolStats,
        crate::services::payment_service::Amount,
        crate::services::payment_service::PaymentRequest,
        crate::services::payment_service::PaymentResponse,
        crate::services::payment_service::PaymentResult,
        crate::domain::Transaction,
        crate::domain::TxnKind,
        crate::domain::TxnStatus,
        crate::domain::TxnError,
        crate::domain::Customer,
        crate::domain::PaymentData,
        crate::domain::PaymentObject,
    )),
    tags(
        (name = "Health"),
        (name = "Transactions", description = "Payment and payout intake"),
        (name = "Callbacks", description = "Provider notifications"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
