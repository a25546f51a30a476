//! Routes provider notifications to the transaction they concern.

use axum::http::Method;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::acquirer::providers::{alpex, auris, paylink, sequoia};
use crate::ports::{RepositoryError, TransactionRepository};
use crate::services::payment_service::PaymentService;

/// Extracts the merchant transaction reference from a raw callback body.
pub type ReferenceExtractor = fn(&str) -> Result<String, serde_json::Error>;

#[derive(Clone, Copy)]
pub struct CallbackMapper {
    pub extract: ReferenceExtractor,
    /// HTTP methods the provider uses for notifications.
    pub methods: &'static [&'static str],
}

const POST_ONLY: &[&str] = &["POST"];

/// Mapper registered for a provider key, if the provider sends callbacks.
pub fn mapper_for(provider: &str) -> Option<CallbackMapper> {
    let extract: ReferenceExtractor = match provider {
        paylink::KEY => paylink::callback_reference,
        sequoia::KEY => sequoia::callback_reference,
        auris::KEY => auris::callback_reference,
        alpex::KEY => alpex::callback_reference,
        _ => return None,
    };
    Some(CallbackMapper {
        extract,
        methods: POST_ONLY,
    })
}

pub fn callback_providers() -> [&'static str; 4] {
    [paylink::KEY, sequoia::KEY, auris::KEY, alpex::KEY]
}

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Method {method} not allowed for {provider} callbacks")]
    MethodNotAllowed { provider: String, method: Method },

    #[error("Callback body is empty")]
    EmptyBody,

    #[error("Callback body is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid transaction reference: {0:?}")]
    InvalidReference(String),

    #[error("Transaction {0} not found")]
    TransactionNotFound(i64),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Result of accepting a callback.
#[derive(Debug)]
pub enum Dispatch {
    /// The body referenced transaction 0; nothing was done.
    Skipped,
    /// The transaction was handed to the lifecycle engine in the background.
    Accepted { txn_id: i64, task: JoinHandle<()> },
}

pub struct CallbackDispatcher {
    repository: Arc<dyn TransactionRepository>,
    service: PaymentService,
}

impl CallbackDispatcher {
    pub fn new(service: PaymentService) -> Self {
        Self {
            repository: service.repository().clone(),
            service,
        }
    }

    /// Parses the merchant reference out of `body` for `provider`.
    pub fn extract_txn_id(
        &self,
        provider: &str,
        method: &Method,
        body: &str,
    ) -> Result<i64, CallbackError> {
        let mapper =
            mapper_for(provider).ok_or_else(|| CallbackError::UnknownProvider(provider.to_string()))?;

        if !mapper.methods.contains(&method.as_str()) {
            return Err(CallbackError::MethodNotAllowed {
                provider: provider.to_string(),
                method: method.clone(),
            });
        }
        if body.trim().is_empty() {
            return Err(CallbackError::EmptyBody);
        }

        let reference = (mapper.extract)(body)?;
        let reference = reference.trim();
        reference
            .parse::<i64>()
            .map_err(|_| CallbackError::InvalidReference(reference.to_string()))
    }

    pub async fn dispatch(
        &self,
        provider: &str,
        method: &Method,
        body: String,
    ) -> Result<Dispatch, CallbackError> {
        let txn_id = self.extract_txn_id(provider, method, &body)?;
        if txn_id == 0 {
            tracing::info!(provider, "Callback references transaction 0, skipping");
            return Ok(Dispatch::Skipped);
        }

        let mut txn = match self.repository.get_by_id(txn_id).await {
            Ok(txn) => txn,
            Err(RepositoryError::NotFound(_)) => {
                return Err(CallbackError::TransactionNotFound(txn_id))
            }
            Err(e) => return Err(CallbackError::Repository(e)),
        };

        tracing::info!(provider, txn_id, "Callback accepted");
        txn.attach_callback(body);

        let service = self.service.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = service.process_existing(txn).await {
                tracing::error!(txn_id, error = %e, "Callback processing failed");
            }
        });

        Ok(Dispatch::Accepted { txn_id, task })
    }
}
