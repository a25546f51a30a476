//! Persistence ports used by the lifecycle engine and the routing layer.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Channel, Gateway, Transaction};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate transaction: {0}")]
    Duplicate(i64),

    #[error("Concurrent update on transaction {txn_id} (expected version {expected})")]
    Conflict { txn_id: i64, expected: i32 },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persists a brand new transaction.
    async fn insert(&self, txn: &Transaction) -> RepositoryResult<Transaction>;

    /// Writes the mutable lifecycle fields. Fails with `Conflict` when the
    /// stored version differs from `txn.version`; on success the returned
    /// transaction carries the bumped version.
    async fn update(&self, txn: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, txn_id: i64) -> RepositoryResult<Transaction>;
}

#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn gateway_by_name(&self, name: &str) -> RepositoryResult<Option<Gateway>>;

    async fn channel_by_name(&self, name: &str) -> RepositoryResult<Option<Channel>>;

    async fn all_gateways(&self) -> RepositoryResult<Vec<Gateway>>;

    async fn all_channels(&self) -> RepositoryResult<Vec<Channel>>;
}
