use acquiring_core::acquirer::{Acquirer, AcquirerError, TransactionOutcome};
use acquiring_core::adapters::InMemoryTransactionRepository;
use acquiring_core::domain::{PaymentData, Transaction, TxnKind, TxnStatus};
use acquiring_core::ports::{RepositoryError, RepositoryResult, TransactionRepository};
use acquiring_core::services::transaction_handler::{ADAPTER_FAILURE_CODE, VALIDATION_ERROR_CODE};
use acquiring_core::services::{EngineError, LifecycleEngine};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Acquirer returning a canned reply for every operation.
struct StubAcquirer {
    reply: Mutex<Option<Result<TransactionOutcome, AcquirerError>>>,
    calls: AtomicUsize,
}

impl StubAcquirer {
    fn replying(reply: Result<TransactionOutcome, AcquirerError>) -> Self {
        Self {
            reply: Mutex::new(Some(reply)),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Result<TransactionOutcome, AcquirerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(TransactionOutcome::pending()))
    }
}

#[async_trait]
impl Acquirer for StubAcquirer {
    fn key(&self) -> &'static str {
        "stub"
    }

    async fn payment(&self, _txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        self.next()
    }

    async fn payout(&self, _txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        self.next()
    }

    async fn handle_callback(&self, _txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        self.next()
    }

    async fn finalize_pending(&self, _txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        self.next()
    }
}

/// Wraps the in-memory store and bumps the stored version behind the
/// engine's back a fixed number of times, simulating concurrent writers.
struct RacingRepository {
    inner: InMemoryTransactionRepository,
    races_left: AtomicUsize,
}

#[async_trait]
impl TransactionRepository for RacingRepository {
    async fn insert(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        self.inner.insert(txn).await
    }

    async fn update(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        if self.races_left.load(Ordering::SeqCst) > 0 {
            self.races_left.fetch_sub(1, Ordering::SeqCst);
            let mut stored = self.inner.get_by_id(txn.txn_id).await?;
            stored.txn_info.insert("touched_by".to_string(), "other-writer".to_string());
            self.inner.update(&stored).await?;
        }
        self.inner.update(txn).await
    }

    async fn get_by_id(&self, txn_id: i64) -> RepositoryResult<Transaction> {
        self.inner.get_by_id(txn_id).await
    }
}

fn new_txn(kind: TxnKind) -> Transaction {
    Transaction::new(
        kind,
        PaymentData::default(),
        None,
        10_000,
        "USD".to_string(),
        "gw".to_string(),
        "ch".to_string(),
    )
}

fn engine(repo: &InMemoryTransactionRepository) -> LifecycleEngine {
    LifecycleEngine::new(Arc::new(repo.clone()))
}

#[tokio::test]
async fn test_payment_is_persisted_before_adapter_reply() {
    let repo = InMemoryTransactionRepository::new();
    let acquirer = StubAcquirer::replying(Ok(TransactionOutcome::pending().with_gtw_txn_id("g-1")));

    let txn = engine(&repo)
        .process(new_txn(TxnKind::Payment), &acquirer)
        .await
        .unwrap();

    assert_eq!(txn.status, TxnStatus::Pending);
    assert_eq!(txn.gtw_txn_id.as_deref(), Some("g-1"));
    assert_eq!(txn.version, 1);

    let stored = repo.get_by_id(txn.txn_id).await.unwrap();
    assert_eq!(stored, txn);
}

/// Store in which every id is already taken.
#[derive(Default)]
struct FullRepository {
    inserts: AtomicUsize,
}

#[async_trait]
impl TransactionRepository for FullRepository {
    async fn insert(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::Duplicate(txn.txn_id))
    }

    async fn update(&self, txn: &Transaction) -> RepositoryResult<Transaction> {
        Err(RepositoryError::NotFound(txn.txn_id.to_string()))
    }

    async fn get_by_id(&self, txn_id: i64) -> RepositoryResult<Transaction> {
        Err(RepositoryError::NotFound(txn_id.to_string()))
    }
}

#[tokio::test]
async fn test_taken_id_is_replaced_on_insert() {
    let repo = InMemoryTransactionRepository::new();
    let existing = repo.insert(&new_txn(TxnKind::Payment)).await.unwrap();

    let mut colliding = new_txn(TxnKind::Payout);
    colliding.txn_id = existing.txn_id;
    let txn = engine(&repo)
        .process(colliding, &StubAcquirer::replying(Ok(TransactionOutcome::pending())))
        .await
        .unwrap();

    assert_ne!(txn.txn_id, existing.txn_id);
    assert_eq!(repo.len().await, 2);
    assert_eq!(repo.get_by_id(existing.txn_id).await.unwrap().kind, TxnKind::Payment);
    assert_eq!(repo.get_by_id(txn.txn_id).await.unwrap().status, TxnStatus::Pending);
}

#[tokio::test]
async fn test_insert_gives_up_after_three_taken_ids() {
    let repo = Arc::new(FullRepository::default());
    let acquirer = StubAcquirer::replying(Ok(TransactionOutcome::pending()));

    let err = LifecycleEngine::new(repo.clone())
        .process(new_txn(TxnKind::Payment), &acquirer)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Repository(RepositoryError::Duplicate(_))));
    assert_eq!(repo.inserts.load(Ordering::SeqCst), 3);
    assert_eq!(acquirer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_validation_error_declines_with_4002() {
    let repo = InMemoryTransactionRepository::new();
    let acquirer = StubAcquirer::replying(Err(AcquirerError::validation(
        "customer full name is required",
    )));

    let txn = engine(&repo)
        .process(new_txn(TxnKind::Payout), &acquirer)
        .await
        .unwrap();

    assert_eq!(txn.status, TxnStatus::Declined);
    let error = txn.error.unwrap();
    assert_eq!(error.code, VALIDATION_ERROR_CODE);
    assert!(error.description.contains("full name"));
}

#[tokio::test]
async fn test_adapter_failure_keeps_status_and_records_5012() {
    let repo = InMemoryTransactionRepository::new();
    let acquirer = StubAcquirer::replying(Err(AcquirerError::MissingGatewayTxnId));

    let txn = engine(&repo)
        .process(new_txn(TxnKind::Payment), &acquirer)
        .await
        .unwrap();

    assert_eq!(txn.status, TxnStatus::New);
    assert_eq!(txn.error.unwrap().code, ADAPTER_FAILURE_CODE);
}

#[tokio::test]
async fn test_unspecified_outcome_leaves_row_untouched() {
    let repo = InMemoryTransactionRepository::new();
    let acquirer = StubAcquirer::replying(Ok(TransactionOutcome::default()));

    let txn = engine(&repo)
        .process(new_txn(TxnKind::Payment), &acquirer)
        .await
        .unwrap();

    assert_eq!(txn.status, TxnStatus::New);
    assert_eq!(repo.get_by_id(txn.txn_id).await.unwrap().version, 0);
}

#[tokio::test]
async fn test_unknown_kind_is_skipped_after_insert() {
    let repo = InMemoryTransactionRepository::new();
    let acquirer = StubAcquirer::replying(Ok(TransactionOutcome::approved()));

    let txn = engine(&repo)
        .process(new_txn(TxnKind::Refund), &acquirer)
        .await
        .unwrap();

    assert_eq!(acquirer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(txn.status, TxnStatus::New);
    assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn test_callback_transaction_is_updated_not_inserted() {
    let repo = InMemoryTransactionRepository::new();
    let engine = engine(&repo);

    let pending = engine
        .process(
            new_txn(TxnKind::Payment),
            &StubAcquirer::replying(Ok(TransactionOutcome::pending())),
        )
        .await
        .unwrap();

    let mut callback = pending.clone();
    callback.attach_callback(r#"{"status":"executed"}"#.to_string());
    let settled = engine
        .process(callback, &StubAcquirer::replying(Ok(TransactionOutcome::approved())))
        .await
        .unwrap();

    assert_eq!(settled.status, TxnStatus::Reconciled);
    assert_eq!(settled.callback_body(), Some(r#"{"status":"executed"}"#));
    assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn test_late_pending_callback_does_not_reopen_reconciled() {
    let repo = InMemoryTransactionRepository::new();
    let engine = engine(&repo);

    let approved = engine
        .process(
            new_txn(TxnKind::Payment),
            &StubAcquirer::replying(Ok(TransactionOutcome::approved())),
        )
        .await
        .unwrap();
    assert_eq!(approved.status, TxnStatus::Reconciled);

    let mut late = approved.clone();
    late.attach_callback("{}".to_string());
    let txn = engine
        .process(late, &StubAcquirer::replying(Ok(TransactionOutcome::pending())))
        .await
        .unwrap();
    assert_eq!(txn.status, TxnStatus::Reconciled);
}

#[tokio::test]
async fn test_finalize_requires_pending() {
    let repo = InMemoryTransactionRepository::new();
    let engine = engine(&repo);
    let txn = repo.insert(&new_txn(TxnKind::Payment)).await.unwrap();

    let acquirer = StubAcquirer::replying(Ok(TransactionOutcome::approved()));
    let err = engine.finalize_pending(txn, &acquirer).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::NotPending {
            status: TxnStatus::New,
            ..
        }
    ));
    assert_eq!(acquirer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_finalize_without_status_endpoint_keeps_pending() {
    let repo = InMemoryTransactionRepository::new();
    let engine = engine(&repo);
    let pending = engine
        .process(
            new_txn(TxnKind::Payment),
            &StubAcquirer::replying(Ok(TransactionOutcome::pending())),
        )
        .await
        .unwrap();

    let err = engine
        .finalize_pending(
            pending.clone(),
            &StubAcquirer::replying(Ok(TransactionOutcome::unsupported_method())),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unsupported { adapter, .. } if adapter == "stub"));

    let stored = repo.get_by_id(pending.txn_id).await.unwrap();
    assert_eq!(stored.status, TxnStatus::Pending);
    assert!(stored.error.is_none());
    assert_eq!(stored.version, pending.version);

    let mut callback = stored.clone();
    callback.attach_callback("{}".to_string());
    let txn = engine
        .process(callback, &StubAcquirer::replying(Ok(TransactionOutcome::approved())))
        .await
        .unwrap();
    assert_eq!(txn.status, TxnStatus::Reconciled);
}

#[tokio::test]
async fn test_finalize_applies_provider_answer() {
    let repo = InMemoryTransactionRepository::new();
    let engine = engine(&repo);
    let pending = engine
        .process(
            new_txn(TxnKind::Payment),
            &StubAcquirer::replying(Ok(TransactionOutcome::pending())),
        )
        .await
        .unwrap();

    let txn = engine
        .finalize_pending(
            pending,
            &StubAcquirer::replying(Ok(TransactionOutcome::provider_rejection("51", "expired"))),
        )
        .await
        .unwrap();

    assert_eq!(txn.status, TxnStatus::Declined);
    let error = txn.error.unwrap();
    assert_eq!(error.code, 51);
    assert_eq!(error.description, "expired");
}

#[tokio::test]
async fn test_conflict_is_retried_on_fresh_row() {
    let inner = InMemoryTransactionRepository::new();
    let repo = Arc::new(RacingRepository {
        inner: inner.clone(),
        races_left: AtomicUsize::new(1),
    });
    let engine = LifecycleEngine::new(repo);

    let txn = engine
        .process(
            new_txn(TxnKind::Payment),
            &StubAcquirer::replying(Ok(TransactionOutcome::approved())),
        )
        .await
        .unwrap();

    assert_eq!(txn.status, TxnStatus::Reconciled);
    assert_eq!(txn.txn_info.get("touched_by").map(String::as_str), Some("other-writer"));
    assert_eq!(txn.version, 2);
}

#[tokio::test]
async fn test_conflict_gives_up_after_three_attempts() {
    let inner = InMemoryTransactionRepository::new();
    let repo = Arc::new(RacingRepository {
        inner: inner.clone(),
        races_left: AtomicUsize::new(10),
    });
    let engine = LifecycleEngine::new(repo);

    let err = engine
        .process(
            new_txn(TxnKind::Payment),
            &StubAcquirer::replying(Ok(TransactionOutcome::approved())),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Repository(RepositoryError::Conflict { .. })
    ));
}
