//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::domain::{Customer, PaymentData, Transaction, TxnError};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const SELECT_COLUMNS: &str = r#"
    txn_id, txn_kind, txn_status, pay_method_id, payment_data, customer,
    gtw_name, chn_name, gtw_txn_id, txn_amount_src, txn_currency_src,
    txn_amount, txn_currency, txn_info, outputs, txn_error,
    created_at, updated_at, version
"#;

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO "transaction" (
                txn_id, txn_kind, txn_status, pay_method_id, payment_data, customer,
                gtw_name, chn_name, gtw_txn_id, txn_amount_src, txn_currency_src,
                txn_amount, txn_currency, txn_info, outputs, txn_error,
                created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {columns}
            "#,
            columns = SELECT_COLUMNS
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(txn.txn_id)
            .bind(txn.kind.as_str())
            .bind(txn.status.as_str())
            .bind(&txn.pay_method_id)
            .bind(Json(&txn.payment_data))
            .bind(txn.customer.as_ref().map(Json))
            .bind(&txn.gtw_name)
            .bind(&txn.chn_name)
            .bind(&txn.gtw_txn_id)
            .bind(txn.amount_src)
            .bind(&txn.currency_src)
            .bind(txn.amount)
            .bind(&txn.currency)
            .bind(Json(&txn.txn_info))
            .bind(Json(&txn.outputs))
            .bind(txn.error.as_ref().map(Json))
            .bind(txn.created_at)
            .bind(txn.updated_at)
            .bind(txn.version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    RepositoryError::Duplicate(txn.txn_id)
                }
                other => RepositoryError::from(other),
            })?;

        row.into_domain()
    }

    async fn update(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            UPDATE "transaction" SET
                txn_kind = $2,
                txn_status = $3,
                gtw_txn_id = $4,
                txn_amount = $5,
                txn_currency = $6,
                txn_info = $7,
                outputs = $8,
                txn_error = $9,
                updated_at = $10,
                version = version + 1
            WHERE txn_id = $1 AND version = $11
            RETURNING {columns}
            "#,
            columns = SELECT_COLUMNS
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(txn.txn_id)
            .bind(txn.kind.as_str())
            .bind(txn.status.as_str())
            .bind(&txn.gtw_txn_id)
            .bind(txn.amount)
            .bind(&txn.currency)
            .bind(Json(&txn.txn_info))
            .bind(Json(&txn.outputs))
            .bind(txn.error.as_ref().map(Json))
            .bind(txn.updated_at)
            .bind(txn.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if let Some(row) = row {
            return row.into_domain();
        }

        let exists: Option<i32> =
            sqlx::query_scalar(r#"SELECT version FROM "transaction" WHERE txn_id = $1"#)
                .bind(txn.txn_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        match exists {
            Some(_) => Err(RepositoryError::Conflict {
                txn_id: txn.txn_id,
                expected: txn.version,
            }),
            None => Err(RepositoryError::NotFound(txn.txn_id.to_string())),
        }
    }

    async fn get_by_id(&self, txn_id: i64) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"SELECT {columns} FROM "transaction" WHERE txn_id = $1"#,
            columns = SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(txn_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(txn_id.to_string()))?
            .into_domain()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    txn_id: i64,
    txn_kind: String,
    txn_status: String,
    pay_method_id: String,
    payment_data: Json<PaymentData>,
    customer: Option<Json<Customer>>,
    gtw_name: String,
    chn_name: String,
    gtw_txn_id: Option<String>,
    txn_amount_src: i64,
    txn_currency_src: String,
    txn_amount: Option<i64>,
    txn_currency: Option<String>,
    txn_info: Json<HashMap<String, String>>,
    outputs: Json<HashMap<String, String>>,
    txn_error: Option<Json<TxnError>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i32,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let kind = self.txn_kind.parse().map_err(RepositoryError::Corrupt)?;
        let status = self.txn_status.parse().map_err(RepositoryError::Corrupt)?;

        Ok(Transaction {
            txn_id: self.txn_id,
            kind,
            status,
            pay_method_id: self.pay_method_id,
            payment_data: self.payment_data.0,
            customer: self.customer.map(|c| c.0),
            gtw_name: self.gtw_name,
            chn_name: self.chn_name,
            gtw_txn_id: self.gtw_txn_id,
            amount_src: self.txn_amount_src,
            currency_src: self.txn_currency_src,
            amount: self.txn_amount,
            currency: self.txn_currency,
            txn_info: self.txn_info.0,
            outputs: self.outputs.0,
            error: self.txn_error.map(|e| e.0),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}
