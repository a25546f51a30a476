//! Result object an adapter hands back to the lifecycle engine.

use std::collections::HashMap;

use crate::acquirer::error::AcquirerError;
use crate::domain::TxnError;

/// Info key carrying the provider's error code.
pub const INFO_ERROR_CODE: &str = "ps_error_code";
/// Info key carrying the provider's error message.
pub const INFO_ERROR_MESSAGE: &str = "ps_error_message";

pub const OUTPUT_CREDENTIALS: &str = "credentials";
pub const OUTPUT_BANK: &str = "bank";
pub const OUTPUT_DESCRIPTION: &str = "description";

/// Error code of the outcome reported for operations a provider lacks.
pub const UNSUPPORTED_METHOD_CODE: i32 = 4001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutcomeStatus {
    /// The adapter never set a status. Treated as a bug by the engine.
    #[default]
    Unspecified,
    Approved,
    Rejected,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedAmount {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionOutcome {
    pub status: OutcomeStatus,
    pub gtw_txn_id: Option<String>,
    pub converted_amount: Option<ConvertedAmount>,
    pub error: Option<TxnError>,
    pub info: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
}

impl TransactionOutcome {
    pub fn approved() -> Self {
        Self::with_status(OutcomeStatus::Approved)
    }

    pub fn rejected() -> Self {
        Self::with_status(OutcomeStatus::Rejected)
    }

    pub fn pending() -> Self {
        Self::with_status(OutcomeStatus::Pending)
    }

    pub fn with_status(status: OutcomeStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Rejected outcome for an operation the provider does not offer.
    pub fn unsupported_method() -> Self {
        Self::rejected().with_error(TxnError::new(
            UNSUPPORTED_METHOD_CODE,
            "Method not implemented",
        ))
    }

    /// Rejected outcome carrying the provider's own code and message.
    pub fn provider_rejection(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        let mut outcome = Self::rejected();
        if !code.is_empty() {
            outcome.add_info(INFO_ERROR_CODE, code);
        }
        if !message.is_empty() {
            outcome.add_info(INFO_ERROR_MESSAGE, message);
        }
        outcome
    }

    pub fn with_error(mut self, error: TxnError) -> Self {
        self.error = Some(error);
        self
    }

    /// Records the provider id. Empty ids are ignored.
    pub fn with_gtw_txn_id(mut self, gtw_txn_id: impl Into<String>) -> Self {
        let gtw_txn_id = gtw_txn_id.into();
        if !gtw_txn_id.is_empty() {
            self.gtw_txn_id = Some(gtw_txn_id);
        }
        self
    }

    pub fn set_converted_amount(
        &mut self,
        amount: i64,
        currency: impl Into<String>,
    ) -> Result<(), AcquirerError> {
        let currency = currency.into();
        if currency.is_empty() {
            return Err(AcquirerError::Validation(
                "converted amount requires a currency".to_string(),
            ));
        }
        self.converted_amount = Some(ConvertedAmount { amount, currency });
        Ok(())
    }

    pub fn add_info(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.info.insert(key.into(), value.into());
    }

    pub fn add_output(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.outputs.insert(key.into(), value.into());
    }

    /// Adds an output only when the provider actually returned a value.
    pub fn add_output_if_present(&mut self, key: &str, value: &str) {
        if !value.is_empty() {
            self.add_output(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_outcome_is_unspecified() {
        assert_eq!(TransactionOutcome::default().status, OutcomeStatus::Unspecified);
    }

    #[test]
    fn test_unsupported_method_outcome() {
        let outcome = TransactionOutcome::unsupported_method();
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
        assert_eq!(outcome.error.unwrap().code, UNSUPPORTED_METHOD_CODE);
    }

    #[test]
    fn test_empty_gtw_txn_id_is_ignored() {
        let outcome = TransactionOutcome::pending().with_gtw_txn_id("");
        assert!(outcome.gtw_txn_id.is_none());

        let outcome = TransactionOutcome::pending().with_gtw_txn_id("abc");
        assert_eq!(outcome.gtw_txn_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_converted_amount_requires_currency() {
        let mut outcome = TransactionOutcome::approved();
        assert!(outcome.set_converted_amount(100, "").is_err());
        assert!(outcome.set_converted_amount(100, "RUB").is_ok());
        assert_eq!(outcome.converted_amount.unwrap().amount, 100);
    }

    #[test]
    fn test_provider_rejection_skips_empty_fields() {
        let outcome = TransactionOutcome::provider_rejection("17", "");
        assert_eq!(outcome.info.get(INFO_ERROR_CODE).map(String::as_str), Some("17"));
        assert!(!outcome.info.contains_key(INFO_ERROR_MESSAGE));
    }
}
