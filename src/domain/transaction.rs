//! Transaction domain entity.
//! Framework-agnostic record of a payment or payout attempt and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Reserved `txn_info` key holding the raw provider callback body.
pub const CALLBACK_INFO_KEY: &str = "callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnKind {
    Payment,
    Refund,
    Reverse,
    Payout,
    Callback,
    Transfer,
    Internal,
}

impl TxnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnKind::Payment => "PAYMENT",
            TxnKind::Refund => "REFUND",
            TxnKind::Reverse => "REVERSE",
            TxnKind::Payout => "PAYOUT",
            TxnKind::Callback => "CALLBACK",
            TxnKind::Transfer => "TRANSFER",
            TxnKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for TxnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT" => Ok(TxnKind::Payment),
            "REFUND" => Ok(TxnKind::Refund),
            "REVERSE" => Ok(TxnKind::Reverse),
            "PAYOUT" => Ok(TxnKind::Payout),
            "CALLBACK" => Ok(TxnKind::Callback),
            "TRANSFER" => Ok(TxnKind::Transfer),
            "INTERNAL" => Ok(TxnKind::Internal),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// Lifecycle status. `Authorized`, `Confirmed` and `Settled` are reserved and
/// never produced by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnStatus {
    New,
    Pending,
    Declined,
    Authorized,
    Confirmed,
    Reconciled,
    Settled,
}

impl TxnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnStatus::New => "NEW",
            TxnStatus::Pending => "PENDING",
            TxnStatus::Declined => "DECLINED",
            TxnStatus::Authorized => "AUTHORIZED",
            TxnStatus::Confirmed => "CONFIRMED",
            TxnStatus::Reconciled => "RECONCILED",
            TxnStatus::Settled => "SETTLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxnStatus::Declined | TxnStatus::Reconciled)
    }
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(TxnStatus::New),
            "PENDING" => Ok(TxnStatus::Pending),
            "DECLINED" => Ok(TxnStatus::Declined),
            "AUTHORIZED" => Ok(TxnStatus::Authorized),
            "CONFIRMED" => Ok(TxnStatus::Confirmed),
            "RECONCILED" => Ok(TxnStatus::Reconciled),
            "SETTLED" => Ok(TxnStatus::Settled),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TxnError {
    pub code: i32,
    #[serde(default)]
    pub description: String,
}

impl TxnError {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserData {
    pub accept_header: String,
    pub color_depth: i32,
    pub language: String,
    pub screen_height: i32,
    pub screen_width: i32,
    pub timezone: i32,
    pub user_agent: String,
    pub java_enabled: bool,
    pub window_height: i32,
    pub window_width: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    pub account_id: String,
    pub fingerprint: String,
    pub ip: String,
    pub phone: String,
    pub email: String,
    pub full_name: String,
    pub country: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub neighborhood: String,
    pub birthdate: String,
    pub browser_data: BrowserData,
}

/// Destination or source instrument details supplied with the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PaymentObject {
    pub credentials: String,
    pub bank: Option<String>,
    pub exp_year: String,
    pub exp_month: String,
    pub cvv: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PaymentData {
    /// Payment method identifier, e.g. `p2pcard` or `sbp`.
    #[serde(rename = "type")]
    pub method: String,
    pub object: PaymentObject,
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub txn_id: i64,
    pub kind: TxnKind,
    pub status: TxnStatus,
    pub pay_method_id: String,
    pub payment_data: PaymentData,
    pub customer: Option<Customer>,
    pub gtw_name: String,
    pub chn_name: String,
    pub gtw_txn_id: Option<String>,
    pub amount_src: i64,
    pub currency_src: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub txn_info: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
    pub error: Option<TxnError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every persisted update.
    pub version: i32,
}

impl Transaction {
    pub fn new(
        kind: TxnKind,
        payment_data: PaymentData,
        customer: Option<Customer>,
        amount_src: i64,
        currency_src: String,
        gtw_name: String,
        chn_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            txn_id: generate_txn_id(),
            kind,
            status: TxnStatus::New,
            pay_method_id: payment_data.method.clone(),
            payment_data,
            customer,
            gtw_name,
            chn_name,
            gtw_txn_id: None,
            amount_src,
            currency_src,
            amount: None,
            currency: None,
            txn_info: HashMap::new(),
            outputs: HashMap::new(),
            error: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Customer full name, empty when no customer is attached.
    pub fn customer_full_name(&self) -> &str {
        self.customer
            .as_ref()
            .map(|c| c.full_name.trim())
            .unwrap_or_default()
    }

    pub fn callback_body(&self) -> Option<&str> {
        self.txn_info.get(CALLBACK_INFO_KEY).map(String::as_str)
    }

    /// Draws a fresh id for a transaction that has not been stored yet.
    pub fn regenerate_id(&mut self) {
        self.txn_id = generate_txn_id();
    }

    /// Stores a raw provider notification and switches the transaction into
    /// callback processing.
    pub fn attach_callback(&mut self, raw_body: String) {
        self.txn_info.insert(CALLBACK_INFO_KEY.to_string(), raw_body);
        self.kind = TxnKind::Callback;
    }

    /// Sets the status and touches `updated_at`. Setting the current status is
    /// a no-op.
    pub fn set_status(&mut self, status: TxnStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Positive 31-bit identifier derived from a random UUID.
fn generate_txn_id() -> i64 {
    let bytes = Uuid::new_v4().into_bytes();
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & 0x7fff_ffff;
    if raw == 0 {
        1
    } else {
        i64::from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction::new(
            TxnKind::Payment,
            PaymentData::default(),
            None,
            10_000,
            "USD".to_string(),
            "gtw".to_string(),
            "chn".to_string(),
        )
    }

    #[test]
    fn test_new_transaction_defaults() {
        let txn = sample();
        assert_eq!(txn.status, TxnStatus::New);
        assert!(txn.txn_id > 0);
        assert!(txn.gtw_txn_id.is_none());
        assert_eq!(txn.version, 0);
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            TxnStatus::New,
            TxnStatus::Pending,
            TxnStatus::Declined,
            TxnStatus::Reconciled,
            TxnStatus::Settled,
        ] {
            assert_eq!(status.as_str().parse::<TxnStatus>().unwrap(), status);
        }
        assert!("BOGUS".parse::<TxnStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TxnStatus::Declined.is_terminal());
        assert!(TxnStatus::Reconciled.is_terminal());
        assert!(!TxnStatus::Pending.is_terminal());
        assert!(!TxnStatus::New.is_terminal());
    }

    #[test]
    fn test_set_status_same_value_keeps_timestamp() {
        let mut txn = sample();
        let before = txn.updated_at;
        txn.set_status(TxnStatus::New);
        assert_eq!(txn.updated_at, before);
    }

    #[test]
    fn test_attach_callback_switches_kind() {
        let mut txn = sample();
        txn.attach_callback("{}".to_string());
        assert_eq!(txn.kind, TxnKind::Callback);
        assert_eq!(txn.callback_body(), Some("{}"));
    }

    #[test]
    fn test_customer_json_uses_camel_case() {
        let customer: Customer =
            serde_json::from_str(r#"{"accountId":"a-1","fullName":"Jane Roe"}"#).unwrap();
        assert_eq!(customer.account_id, "a-1");
        assert_eq!(customer.full_name, "Jane Roe");
    }
}
