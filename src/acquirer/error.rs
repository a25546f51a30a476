use thiserror::Error;

use crate::crypto::CryptoError;

/// Failure of an adapter call. Business rejections are not errors; they come
/// back as a Rejected outcome.
#[derive(Error, Debug)]
pub enum AcquirerError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Undecodable provider response (HTTP {status}): {message}")]
    Decode { status: u16, message: String },

    #[error("Invalid transaction data: {0}")]
    Validation(String),

    #[error("Callback authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed callback: {0}")]
    MalformedCallback(String),

    #[error("Callback body is missing")]
    MissingCallback,

    #[error("Transaction has no gateway transaction id")]
    MissingGatewayTxnId,

    #[error("Provider amount {reported} differs from requested {requested} beyond tolerance")]
    AmountOutOfTolerance { requested: String, reported: String },

    #[error("Signing failed: {0}")]
    Signing(#[from] CryptoError),

    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
}

impl AcquirerError {
    /// Validation failures are raised before any network call and decline the
    /// transaction; every other error leaves its status untouched.
    pub fn is_validation(&self) -> bool {
        matches!(self, AcquirerError::Validation(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AcquirerError::Validation(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        AcquirerError::Authentication(message.into())
    }
}
