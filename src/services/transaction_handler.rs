//! Lifecycle engine: runs one adapter call for a transaction and applies the
//! outcome to its state machine. The engine is the only writer of
//! transaction status.

use std::sync::Arc;
use thiserror::Error;

use crate::acquirer::outcome::{INFO_ERROR_CODE, INFO_ERROR_MESSAGE, UNSUPPORTED_METHOD_CODE};
use crate::acquirer::{Acquirer, AcquirerError, OutcomeStatus, TransactionOutcome};
use crate::domain::{Transaction, TxnError, TxnKind, TxnStatus, CALLBACK_INFO_KEY};
use crate::ports::{RepositoryError, TransactionRepository};

/// Error code recorded when an adapter refuses the transaction data.
pub const VALIDATION_ERROR_CODE: i32 = 4002;
/// Error code recorded when an adapter call fails.
pub const ADAPTER_FAILURE_CODE: i32 = 5012;
/// Code used when a rejection's `ps_error_code` is not an integer.
pub const UNPARSED_ERROR_CODE: i32 = 0;

const MAX_UPDATE_ATTEMPTS: usize = 3;
const MAX_INSERT_ATTEMPTS: usize = 3;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Transaction {txn_id} is {status}, only PENDING transactions can be finalized")]
    NotPending { txn_id: i64, status: TxnStatus },

    #[error("Adapter {adapter} cannot poll transaction {txn_id}")]
    Unsupported { txn_id: i64, adapter: String },
}

pub struct LifecycleEngine {
    repository: Arc<dyn TransactionRepository>,
}

impl LifecycleEngine {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }

    /// Persists a new transaction, dispatches it to `acquirer` by kind and
    /// stores the result. Callback transactions already exist and are only
    /// updated.
    ///
    /// Adapter failures do not fail this call: they are recorded on the
    /// returned transaction's `error`.
    pub async fn process(
        &self,
        txn: Transaction,
        acquirer: &dyn Acquirer,
    ) -> Result<Transaction, EngineError> {
        let txn = if txn.kind == TxnKind::Callback {
            txn
        } else {
            insert_new(self.repository.as_ref(), txn).await?
        };

        tracing::info!(
            txn_id = txn.txn_id,
            kind = %txn.kind,
            adapter = acquirer.key(),
            "Processing transaction"
        );

        let result = match txn.kind {
            TxnKind::Payment => acquirer.payment(&txn).await,
            TxnKind::Payout => acquirer.payout(&txn).await,
            TxnKind::Callback => acquirer.handle_callback(&txn).await,
            other => {
                tracing::warn!(txn_id = txn.txn_id, kind = %other, "Unknown transaction kind, skipping");
                return Ok(txn);
            }
        };

        self.resolve(txn, result).await
    }

    /// Polls the provider for a pending transaction and applies the answer.
    pub async fn finalize_pending(
        &self,
        txn: Transaction,
        acquirer: &dyn Acquirer,
    ) -> Result<Transaction, EngineError> {
        if txn.status != TxnStatus::Pending {
            return Err(EngineError::NotPending {
                txn_id: txn.txn_id,
                status: txn.status,
            });
        }

        tracing::info!(txn_id = txn.txn_id, adapter = acquirer.key(), "Finalizing pending transaction");
        let result = acquirer.finalize_pending(&txn).await;
        if let Ok(outcome) = &result {
            if is_unsupported(outcome) {
                tracing::warn!(
                    txn_id = txn.txn_id,
                    adapter = acquirer.key(),
                    "Adapter has no status endpoint, transaction left pending"
                );
                return Err(EngineError::Unsupported {
                    txn_id: txn.txn_id,
                    adapter: acquirer.key().to_string(),
                });
            }
        }
        self.resolve(txn, result).await
    }

    async fn resolve(
        &self,
        txn: Transaction,
        result: Result<TransactionOutcome, AcquirerError>,
    ) -> Result<Transaction, EngineError> {
        match result {
            Ok(outcome) => {
                if outcome.status == OutcomeStatus::Unspecified {
                    tracing::error!(
                        txn_id = txn.txn_id,
                        "Acquirer returned an unspecified status, transaction left untouched"
                    );
                    return Ok(txn);
                }
                self.persist(txn, |t| apply_outcome(t, &outcome)).await
            }
            Err(err) => {
                tracing::error!(txn_id = txn.txn_id, error = %err, "Acquirer call failed");
                self.persist(txn, |t| apply_failure(t, &err)).await
            }
        }
    }

    /// Applies `apply` and writes the transaction. A concurrent writer makes
    /// the update fail with `Conflict`; the row is then reloaded and the same
    /// change re-applied to the fresh state.
    async fn persist<F>(&self, txn: Transaction, apply: F) -> Result<Transaction, EngineError>
    where
        F: Fn(&mut Transaction),
    {
        let callback_body = txn.callback_body().map(str::to_string);
        let mut txn = txn;
        let mut attempt = 1;

        loop {
            apply(&mut txn);
            match self.repository.update(&txn).await {
                Ok(updated) => {
                    tracing::info!(
                        txn_id = updated.txn_id,
                        status = %updated.status,
                        "Transaction updated"
                    );
                    return Ok(updated);
                }
                Err(RepositoryError::Conflict { txn_id, expected }) if attempt < MAX_UPDATE_ATTEMPTS => {
                    tracing::warn!(
                        txn_id,
                        expected_version = expected,
                        attempt,
                        "Concurrent transaction update, reloading"
                    );
                    let mut fresh = self.repository.get_by_id(txn_id).await?;
                    if let Some(body) = &callback_body {
                        fresh.attach_callback(body.clone());
                    }
                    txn = fresh;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(txn_id = txn.txn_id, error = %e, "Failed to update transaction");
                    return Err(e.into());
                }
            }
        }
    }
}

/// Inserts a new transaction, drawing another id when the random one is
/// already taken.
pub(crate) async fn insert_new(
    repository: &dyn TransactionRepository,
    mut txn: Transaction,
) -> Result<Transaction, RepositoryError> {
    let mut attempt = 1;
    loop {
        match repository.insert(&txn).await {
            Err(RepositoryError::Duplicate(taken)) if attempt < MAX_INSERT_ATTEMPTS => {
                txn.regenerate_id();
                tracing::warn!(taken, txn_id = txn.txn_id, attempt, "Transaction id taken, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Moves `txn` toward `target` unless it already reached a different
/// terminal status. Returns whether `txn` is now in `target`.
fn transition(txn: &mut Transaction, target: TxnStatus) -> bool {
    if txn.status.is_terminal() && txn.status != target {
        tracing::warn!(
            txn_id = txn.txn_id,
            current = %txn.status,
            requested = %target,
            "Transaction status already final, not changing it"
        );
        return false;
    }
    txn.set_status(target);
    true
}

fn is_unsupported(outcome: &TransactionOutcome) -> bool {
    outcome.status == OutcomeStatus::Rejected
        && outcome
            .error
            .as_ref()
            .is_some_and(|e| e.code == UNSUPPORTED_METHOD_CODE)
}

/// Error stored for a rejection that carries no structured error.
pub fn synthesize_error(outcome: &TransactionOutcome) -> TxnError {
    let code = outcome
        .info
        .get(INFO_ERROR_CODE)
        .and_then(|code| code.trim().parse::<i32>().ok())
        .unwrap_or(UNPARSED_ERROR_CODE);
    let description = outcome
        .info
        .get(INFO_ERROR_MESSAGE)
        .cloned()
        .unwrap_or_default();
    TxnError::new(code, description)
}

pub(crate) fn apply_outcome(txn: &mut Transaction, outcome: &TransactionOutcome) {
    let applied = match outcome.status {
        OutcomeStatus::Approved => {
            let moved = transition(txn, TxnStatus::Reconciled);
            if moved {
                tracing::info!(txn_id = txn.txn_id, "Transaction approved");
            }
            moved
        }
        OutcomeStatus::Rejected => {
            let error = outcome
                .error
                .clone()
                .unwrap_or_else(|| synthesize_error(outcome));
            let moved = transition(txn, TxnStatus::Declined);
            if moved {
                tracing::info!(
                    txn_id = txn.txn_id,
                    code = error.code,
                    description = %error.description,
                    "Transaction declined"
                );
                txn.error = Some(error);
            }
            moved
        }
        OutcomeStatus::Pending => {
            let moved = transition(txn, TxnStatus::Pending);
            if moved {
                tracing::info!(txn_id = txn.txn_id, "Transaction pending");
            }
            moved
        }
        OutcomeStatus::Unspecified => false,
    };
    if !applied {
        return;
    }

    if let Some(gtw_txn_id) = &outcome.gtw_txn_id {
        match &txn.gtw_txn_id {
            None => txn.gtw_txn_id = Some(gtw_txn_id.clone()),
            Some(current) if current != gtw_txn_id => tracing::warn!(
                txn_id = txn.txn_id,
                current = %current,
                reported = %gtw_txn_id,
                "Provider reported a different gateway transaction id, keeping the first"
            ),
            Some(_) => {}
        }
    }

    if let Some(converted) = &outcome.converted_amount {
        txn.amount = Some(converted.amount);
        txn.currency = Some(converted.currency.clone());
    }

    for (key, value) in &outcome.outputs {
        txn.outputs.insert(key.clone(), value.clone());
    }
    for (key, value) in &outcome.info {
        if key != CALLBACK_INFO_KEY {
            txn.txn_info.insert(key.clone(), value.clone());
        }
    }
}

pub(crate) fn apply_failure(txn: &mut Transaction, err: &AcquirerError) {
    if err.is_validation() {
        if transition(txn, TxnStatus::Declined) {
            txn.error = Some(TxnError::new(VALIDATION_ERROR_CODE, err.to_string()));
        }
        return;
    }
    txn.error = Some(TxnError::new(ADAPTER_FAILURE_CODE, err.to_string()));
}
