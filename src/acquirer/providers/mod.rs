//! Provider adapters and the helpers they share.

pub mod alpex;
pub mod asupay;
pub mod auris;
pub mod paylink;
pub mod sequoia;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::acquirer::error::AcquirerError;
use crate::acquirer::http::ProviderClient;
use crate::acquirer::outcome::OutcomeStatus;
use crate::domain::Transaction;

/// Connection block found in every gateway's params.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Transport {
    pub base_address: String,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Transport {
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(default)
    }
}

/// Runtime collaborators the registry hands to every adapter.
#[derive(Clone)]
pub struct AdapterContext {
    pub client: ProviderClient,
    /// Notification URL the provider should call back, unique per adapter key.
    pub callback_url: String,
}

/// Decodes the provider notification stored on the transaction.
pub(crate) fn parse_callback<T: DeserializeOwned>(txn: &Transaction) -> Result<T, AcquirerError> {
    let body = txn.callback_body().ok_or(AcquirerError::MissingCallback)?;
    serde_json::from_str(body).map_err(|e| AcquirerError::MalformedCallback(e.to_string()))
}

pub(crate) fn require_gtw_txn_id(txn: &Transaction) -> Result<&str, AcquirerError> {
    txn.gtw_txn_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(AcquirerError::MissingGatewayTxnId)
}

/// Fallback for provider statuses outside the known vocabulary. The
/// transaction stays pending so a later callback or poll can settle it.
pub(crate) fn unrecognized_status(adapter: &str, status: &str) -> OutcomeStatus {
    tracing::warn!(
        adapter = adapter,
        provider_status = status,
        "unrecognized provider status, keeping transaction pending"
    );
    OutcomeStatus::Pending
}

/// Reads one string or integer field of a callback body as the merchant
/// reference.
pub(crate) fn reference_field(body: &str, field: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    Ok(match value.get(field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_timeout_defaults() {
        let transport = Transport {
            base_address: "http://x".to_string(),
            timeout: None,
        };
        assert_eq!(
            transport.timeout_or(Duration::from_secs(30)),
            Duration::from_secs(30)
        );

        let transport = Transport {
            base_address: "http://x".to_string(),
            timeout: Some(5),
        };
        assert_eq!(
            transport.timeout_or(Duration::from_secs(30)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_reference_field_accepts_numbers_and_strings() {
        assert_eq!(reference_field(r#"{"label":"42"}"#, "label").unwrap(), "42");
        assert_eq!(reference_field(r#"{"label":42}"#, "label").unwrap(), "42");
        assert_eq!(reference_field(r#"{"other":1}"#, "label").unwrap(), "");
        assert!(reference_field("not json", "label").is_err());
    }
}
