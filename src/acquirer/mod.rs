//! Acquirer contract and its provider implementations.

pub mod error;
pub mod http;
pub mod outcome;
pub mod providers;
pub mod registry;

use async_trait::async_trait;

use crate::domain::Transaction;

pub use error::AcquirerError;
pub use outcome::{ConvertedAmount, OutcomeStatus, TransactionOutcome};
pub use registry::{AcquirerRegistry, RegistryError};

/// Uniform capability every payment provider integration implements.
///
/// Implementations never touch the transaction: everything they learn from
/// the provider goes back through [`TransactionOutcome`], and the lifecycle
/// engine is the only writer of transaction state. Dropping a returned future
/// aborts the in-flight provider request.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Stable key of the adapter implementation, e.g. `paylink`.
    fn key(&self) -> &'static str;

    /// Starts a deposit. A pending provider reply carries payment
    /// instructions in the outcome outputs.
    async fn payment(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError>;

    /// Starts a disbursement. Missing destination or identity data fails with
    /// [`AcquirerError::Validation`] before any request is sent.
    async fn payout(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError>;

    /// Authenticates and interprets the notification stored under the
    /// `callback` key of `txn_info`.
    async fn handle_callback(&self, txn: &Transaction)
        -> Result<TransactionOutcome, AcquirerError>;

    /// Polls the provider for a transaction stuck in Pending.
    async fn finalize_pending(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError>;
}
