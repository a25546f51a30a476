//! In-memory repositories for tests and local runs without Postgres.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{Channel, Gateway, Transaction};
use crate::ports::{RepositoryError, RepositoryResult, RouteRepository, TransactionRepository};

/// Thread-safe transaction store with the same version semantics as the
/// Postgres adapter.
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<i64, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&txn.txn_id) {
            return Err(RepositoryError::Duplicate(txn.txn_id));
        }
        transactions.insert(txn.txn_id, txn.clone());
        Ok(txn.clone())
    }

    async fn update(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let stored = transactions
            .get_mut(&txn.txn_id)
            .ok_or_else(|| RepositoryError::NotFound(txn.txn_id.to_string()))?;

        if stored.version != txn.version {
            return Err(RepositoryError::Conflict {
                txn_id: txn.txn_id,
                expected: txn.version,
            });
        }

        let mut updated = txn.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn get_by_id(&self, txn_id: i64) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&txn_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(txn_id.to_string()))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryRouteRepository {
    gateways: Arc<RwLock<HashMap<String, Gateway>>>,
    channels: Arc<RwLock<HashMap<String, Channel>>>,
}

impl InMemoryRouteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_gateway(&self, gateway: Gateway) {
        self.gateways
            .write()
            .await
            .insert(gateway.name.clone(), gateway);
    }

    pub async fn add_channel(&self, channel: Channel) {
        self.channels
            .write()
            .await
            .insert(channel.name.clone(), channel);
    }
}

#[async_trait]
impl RouteRepository for InMemoryRouteRepository {
    async fn gateway_by_name(&self, name: &str) -> RepositoryResult<Option<Gateway>> {
        Ok(self.gateways.read().await.get(name).cloned())
    }

    async fn channel_by_name(&self, name: &str) -> RepositoryResult<Option<Channel>> {
        Ok(self.channels.read().await.get(name).cloned())
    }

    async fn all_gateways(&self) -> RepositoryResult<Vec<Gateway>> {
        Ok(self.gateways.read().await.values().cloned().collect())
    }

    async fn all_channels(&self) -> RepositoryResult<Vec<Channel>> {
        Ok(self.channels.read().await.values().cloned().collect())
    }
}
