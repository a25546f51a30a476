//! Intake of payment and payout requests: validation, routing, adapter
//! resolution and handing the transaction to the lifecycle engine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

use crate::acquirer::outcome::{OUTPUT_BANK, OUTPUT_CREDENTIALS, OUTPUT_DESCRIPTION};
use crate::acquirer::{Acquirer, AcquirerRegistry, RegistryError};
use crate::domain::{Customer, PaymentData, Transaction, TxnError, TxnKind, TxnStatus};
use crate::ports::{RepositoryError, TransactionRepository};
use crate::services::route_cache::{RouteCache, RouteError};
use crate::services::transaction_handler::{insert_new, EngineError, LifecycleEngine};
use crate::validation::{sanitize_string, validate_payment_request, ValidationError};

/// Error code recorded on a transaction whose gateway or channel is unknown.
pub const ROUTE_NOT_FOUND_CODE: i32 = 4004;
/// Error code recorded when the adapter cannot be built from its configuration.
pub const ADAPTER_CONFIG_CODE: i32 = 5013;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Amount {
    /// Integer minor units.
    pub value: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub payment_data: PaymentData,
    pub amount: Amount,
    pub gtw_name: String,
    pub chn_name: String,
}

/// Customer-facing payment instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentResult {
    pub credentials: String,
    pub bank: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub txn_id: i64,
    pub txn_status: TxnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PaymentResult>,
}

impl From<&Transaction> for PaymentResponse {
    fn from(txn: &Transaction) -> Self {
        let result = (!txn.outputs.is_empty()).then(|| {
            let output = |key: &str| txn.outputs.get(key).cloned().unwrap_or_default();
            PaymentResult {
                credentials: output(OUTPUT_CREDENTIALS),
                bank: output(OUTPUT_BANK),
                description: output(OUTPUT_DESCRIPTION),
            }
        });

        PaymentResponse {
            txn_id: txn.txn_id,
            txn_status: txn.status,
            result,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transaction {txn_id} could not be routed: {source}")]
    RouteNotFound {
        txn_id: i64,
        #[source]
        source: RouteError,
    },

    #[error("Acquirer unavailable: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct PaymentService {
    repository: Arc<dyn TransactionRepository>,
    routes: Arc<RouteCache>,
    registry: Arc<AcquirerRegistry>,
    engine: Arc<LifecycleEngine>,
}

impl PaymentService {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        routes: Arc<RouteCache>,
        registry: Arc<AcquirerRegistry>,
    ) -> Self {
        let engine = Arc::new(LifecycleEngine::new(repository.clone()));
        Self {
            repository,
            routes,
            registry,
            engine,
        }
    }

    pub fn repository(&self) -> &Arc<dyn TransactionRepository> {
        &self.repository
    }

    pub fn registry(&self) -> &Arc<AcquirerRegistry> {
        &self.registry
    }

    /// Creates a payment or payout transaction and runs it through its
    /// acquirer.
    pub async fn create(
        &self,
        kind: TxnKind,
        request: PaymentRequest,
    ) -> Result<PaymentResponse, ServiceError> {
        validate_payment_request(&request)?;

        let mut txn = Transaction::new(
            kind,
            request.payment_data,
            request.customer,
            request.amount.value,
            request.amount.currency,
            sanitize_string(&request.gtw_name),
            sanitize_string(&request.chn_name),
        );

        let route = match self.routes.route(&txn.gtw_name, &txn.chn_name) {
            Ok(route) => route,
            Err(source) => {
                tracing::warn!(
                    txn_id = txn.txn_id,
                    gateway = %txn.gtw_name,
                    channel = %txn.chn_name,
                    error = %source,
                    "Route not found"
                );
                txn.error = Some(TxnError::new(ROUTE_NOT_FOUND_CODE, source.to_string()));
                let stored = insert_new(self.repository.as_ref(), txn).await?;
                return Err(ServiceError::RouteNotFound {
                    txn_id: stored.txn_id,
                    source,
                });
            }
        };

        let acquirer = match self.registry.resolve(&route) {
            Ok(acquirer) => acquirer,
            Err(e) => {
                tracing::error!(
                    txn_id = txn.txn_id,
                    gateway = %txn.gtw_name,
                    error = %e,
                    "Failed to create acquirer for gateway"
                );
                txn.set_status(TxnStatus::Declined);
                txn.error = Some(TxnError::new(ADAPTER_CONFIG_CODE, e.to_string()));
                let stored = insert_new(self.repository.as_ref(), txn).await?;
                return Ok(PaymentResponse::from(&stored));
            }
        };

        let txn = self.engine.process(txn, acquirer.as_ref()).await?;
        Ok(PaymentResponse::from(&txn))
    }

    /// Runs an already stored transaction (e.g. one carrying a callback)
    /// through the acquirer of its route.
    pub async fn process_existing(&self, txn: Transaction) -> Result<Transaction, ServiceError> {
        let acquirer = self.acquirer_for(&txn)?;
        Ok(self.engine.process(txn, acquirer.as_ref()).await?)
    }

    /// Polls the provider once for a pending transaction.
    pub async fn finalize(&self, txn_id: i64) -> Result<Transaction, ServiceError> {
        let txn = self.repository.get_by_id(txn_id).await?;
        let acquirer = self.acquirer_for(&txn)?;
        Ok(self.engine.finalize_pending(txn, acquirer.as_ref()).await?)
    }

    pub async fn get(&self, txn_id: i64) -> Result<Transaction, ServiceError> {
        Ok(self.repository.get_by_id(txn_id).await?)
    }

    fn acquirer_for(&self, txn: &Transaction) -> Result<Box<dyn Acquirer>, ServiceError> {
        let route = self
            .routes
            .route(&txn.gtw_name, &txn.chn_name)
            .map_err(|source| ServiceError::RouteNotFound {
                txn_id: txn.txn_id,
                source,
            })?;
        Ok(self.registry.resolve(&route)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn txn_with_outputs(outputs: HashMap<String, String>) -> Transaction {
        let mut txn = Transaction::new(
            TxnKind::Payment,
            PaymentData::default(),
            None,
            100,
            "USD".to_string(),
            "gw".to_string(),
            "ch".to_string(),
        );
        txn.outputs = outputs;
        txn
    }

    #[test]
    fn test_response_without_outputs_has_no_result() {
        let response = PaymentResponse::from(&txn_with_outputs(HashMap::new()));
        assert!(response.result.is_none());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["txn_status"], "NEW");
    }

    #[test]
    fn test_response_copies_known_outputs() {
        let outputs = HashMap::from([
            ("credentials".to_string(), "IBAN123".to_string()),
            ("qr_data".to_string(), "https://qr".to_string()),
        ]);
        let response = PaymentResponse::from(&txn_with_outputs(outputs));
        let result = response.result.unwrap();
        assert_eq!(result.credentials, "IBAN123");
        assert_eq!(result.bank, "");
    }
}
