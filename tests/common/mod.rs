#![allow(dead_code)]

use acquiring_core::acquirer::AcquirerRegistry;
use acquiring_core::adapters::InMemoryTransactionRepository;
use acquiring_core::domain::{Channel, Gateway};
use acquiring_core::services::{PaymentService, RouteCache};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const CALLBACK_BASE_URL: &str = "https://acquiring.test";

pub fn gateway(id: i32, name: &str, adapter_key: &str, params: Value) -> Gateway {
    Gateway {
        id,
        name: name.to_string(),
        adapter_key: adapter_key.to_string(),
        params,
        is_active: true,
    }
}

pub fn channel(id: i32, name: &str, gateway_id: i32, credentials: Value) -> Channel {
    Channel {
        id,
        name: name.to_string(),
        gateway_id,
        params: json!({ "credentials": credentials }),
        is_active: true,
    }
}

/// One gateway per adapter key, all pointing at `base_address`, each with a
/// channel named `<key>-main`.
pub fn provider_routes(base_address: &str) -> RouteCache {
    let transport = json!({ "base_address": base_address, "timeout": 5 });
    let gateways = vec![
        gateway(1, "paylink-gw", "paylink", json!({ "transport": transport })),
        gateway(2, "sequoia-gw", "sequoia", json!({ "transport": transport, "percentage_difference": "10" })),
        gateway(
            3,
            "auris-gw",
            "auris",
            json!({
                "transport": transport,
                "payment_methods": [{ "id": "p2pcard", "gtw_id": { "RUB": 643 } }],
                "payout_methods": [{ "id": "sbp", "gtw_id": { "RUB": 643 } }]
            }),
        ),
        gateway(4, "alpex-gw", "alpex", json!({ "transport": transport })),
        gateway(5, "asupay-gw", "asupay", json!({ "transport": transport })),
        gateway(6, "broken-gw", "paylink", json!({ "transport": "not-an-object" })),
    ];
    let channels = vec![
        channel(1, "paylink-main", 1, json!({ "api_key": "paylink-key", "merch_id": "m-1" })),
        channel(2, "sequoia-main", 2, json!({ "secret_key": "seq-secret", "callback_secret": "seq-cb" })),
        channel(3, "auris-main", 3, json!({ "api_key": "auris-key", "shop_id": 77 })),
        channel(
            4,
            "alpex-main",
            4,
            json!({ "gate_id": "gate-1", "login": { "email": "ops@example.com", "password": "pw" } }),
        ),
        channel(5, "asupay-main", 5, json!({ "merchant": "m-5", "secret_key": "asu-secret", "api_key": "asu-api" })),
        channel(6, "broken-main", 6, json!({ "api_key": "k", "merch_id": "m" })),
    ];
    RouteCache::from_routes(gateways, channels)
}

pub fn payment_service(
    repository: InMemoryTransactionRepository,
    routes: RouteCache,
) -> PaymentService {
    PaymentService::new(
        Arc::new(repository),
        Arc::new(routes),
        Arc::new(AcquirerRegistry::new(CALLBACK_BASE_URL, Duration::from_secs(5))),
    )
}

pub fn payment_request(gtw_name: &str, chn_name: &str, method: &str, value: i64, currency: &str) -> Value {
    json!({
        "customer": {
            "accountId": "acc-1",
            "ip": "203.0.113.7",
            "fullName": "Jane Roe",
            "phone": "+79990001122"
        },
        "payment_data": { "type": method, "object": { "credentials": "" } },
        "amount": { "value": value, "currency": currency },
        "gtw_name": gtw_name,
        "chn_name": chn_name
    })
}
