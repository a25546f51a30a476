mod common;

use acquiring_core::adapters::InMemoryTransactionRepository;
use acquiring_core::services::callback::callback_providers;
use acquiring_core::services::{CallbackDispatcher, CallbackError, Dispatch};
use axum::http::Method;

fn dispatcher() -> CallbackDispatcher {
    let service = common::payment_service(
        InMemoryTransactionRepository::new(),
        common::provider_routes("http://127.0.0.1:1"),
    );
    CallbackDispatcher::new(service)
}

fn body_for(provider: &str, reference: &str) -> String {
    match provider {
        "paylink" => format!(r#"{{"id":"p-1","user_ref":"{}","status":"executed"}}"#, reference),
        "sequoia" => format!(r#"{{"order_id":"{}","status":"success"}}"#, reference),
        "auris" => format!(r#"{{"id":1,"label":"{}","status":3}}"#, reference),
        "alpex" => format!(r#"{{"_id":"o-1","external_id":"{}","status":"RELEASED"}}"#, reference),
        other => panic!("no body for {other}"),
    }
}

#[test]
fn test_every_provider_maps_its_reference_field() {
    let dispatcher = dispatcher();
    for provider in callback_providers() {
        let txn_id = dispatcher
            .extract_txn_id(provider, &Method::POST, &body_for(provider, "424242"))
            .unwrap();
        assert_eq!(txn_id, 424242, "{provider}");
    }
}

#[test]
fn test_unknown_and_payout_only_providers_are_rejected() {
    let dispatcher = dispatcher();
    for provider in ["nestpay", "asupay", ""] {
        let err = dispatcher
            .extract_txn_id(provider, &Method::POST, "{}")
            .unwrap_err();
        assert!(matches!(err, CallbackError::UnknownProvider(_)), "{provider}");
    }
}

#[test]
fn test_only_post_is_accepted() {
    let dispatcher = dispatcher();
    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let err = dispatcher
            .extract_txn_id("paylink", &method, &body_for("paylink", "1"))
            .unwrap_err();
        assert!(matches!(err, CallbackError::MethodNotAllowed { .. }));
    }
}

#[test]
fn test_body_errors() {
    let dispatcher = dispatcher();

    let err = dispatcher.extract_txn_id("sequoia", &Method::POST, "  ").unwrap_err();
    assert!(matches!(err, CallbackError::EmptyBody));

    let err = dispatcher
        .extract_txn_id("sequoia", &Method::POST, "order_id=1")
        .unwrap_err();
    assert!(matches!(err, CallbackError::Malformed(_)));

    let err = dispatcher
        .extract_txn_id("auris", &Method::POST, &body_for("auris", "abc"))
        .unwrap_err();
    assert!(matches!(err, CallbackError::InvalidReference(r) if r == "abc"));
}

#[test]
fn test_numeric_reference_is_accepted() {
    let dispatcher = dispatcher();
    let txn_id = dispatcher
        .extract_txn_id("auris", &Method::POST, r#"{"id":1,"label":77,"status":0}"#)
        .unwrap();
    assert_eq!(txn_id, 77);
}

#[tokio::test]
async fn test_missing_reference_is_rejected() {
    let dispatcher = dispatcher();
    for (provider, body) in [
        ("paylink", r#"{"id":"p-1","status":"executed"}"#),
        ("auris", r#"{"id":5,"status":3,"sign":"x"}"#),
    ] {
        let err = dispatcher
            .dispatch(provider, &Method::POST, body.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::InvalidReference(ref r) if r.is_empty()), "{provider}");
    }
}

#[tokio::test]
async fn test_zero_reference_is_skipped() {
    let dispatcher = dispatcher();
    let result = dispatcher
        .dispatch("paylink", &Method::POST, body_for("paylink", "0"))
        .await
        .unwrap();
    assert!(matches!(result, Dispatch::Skipped));
}

#[tokio::test]
async fn test_unknown_transaction_is_reported() {
    let dispatcher = dispatcher();
    let err = dispatcher
        .dispatch("alpex", &Method::POST, body_for("alpex", "31337"))
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::TransactionNotFound(31337)));
}
