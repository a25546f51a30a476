pub mod acquirer;
pub mod adapters;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;

use crate::middleware::callback_source::{callback_source_middleware, CallbackSources};
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::services::{CallbackDispatcher, PaymentService};

#[derive(Clone)]
pub struct AppState {
    /// Present when running against Postgres; used by the health check.
    pub db: Option<sqlx::PgPool>,
    pub payments: PaymentService,
    pub callbacks: Arc<CallbackDispatcher>,
}

impl AppState {
    pub fn new(db: Option<sqlx::PgPool>, payments: PaymentService) -> Self {
        let callbacks = Arc::new(CallbackDispatcher::new(payments.clone()));
        Self {
            db,
            payments,
            callbacks,
        }
    }
}

/// HTTP-level settings that shape the router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub callback_sources: CallbackSources,
    pub request_log: RequestLogConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            callback_sources: CallbackSources::default(),
            request_log: RequestLogConfig::default(),
        }
    }
}

impl From<&config::Config> for RouterConfig {
    fn from(config: &config::Config) -> Self {
        Self {
            callback_sources: config.callback_sources.clone(),
            request_log: RequestLogConfig {
                log_body: config.log_request_body,
            },
        }
    }
}

pub fn create_app(state: AppState, router_config: RouterConfig) -> Router {
    let callback_routes = Router::new()
        .route("/callback/:provider", any(handlers::callback::callback))
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(router_config.callback_sources),
            callback_source_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/payment", post(handlers::payments::create_payment))
        .route("/payout", post(handlers::payments::create_payout))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .route(
            "/transactions/:id/finalize",
            post(handlers::transactions::finalize_transaction),
        )
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .merge(callback_routes)
        .layer(axum::middleware::from_fn_with_state(
            router_config.request_log,
            request_logger_middleware,
        ))
        .with_state(state)
}
