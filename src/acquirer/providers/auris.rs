//! Auris: deposits and payouts routed through a per-gateway method table.
//!
//! Requests and callbacks are signed the same way: every field is flattened
//! to a dotted key, `sign` is dropped, values are joined with `:` in key
//! order, `:<api_key>` is appended and the result is SHA-1 hex encoded.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::acquirer::http::RequestOptions;
use crate::acquirer::outcome::{
    OutcomeStatus, TransactionOutcome, INFO_ERROR_MESSAGE, OUTPUT_BANK, OUTPUT_CREDENTIALS,
};
use crate::acquirer::providers::{
    reference_field, require_gtw_txn_id, unrecognized_status, AdapterContext, Transport,
};
use crate::acquirer::{Acquirer, AcquirerError};
use crate::crypto::{self, Encoding, HashAlgorithm};
use crate::domain::{Transaction, TxnError};

pub const KEY: &str = "auris";

pub const CALLBACK_REFERENCE_FIELD: &str = "label";

/// Error code recorded when the provider lets a transaction expire.
pub const EXPIRED_ERROR_CODE: i32 = 5003;

const DEPOSIT_PATH: &str = "deposit";
const WITHDRAW_PATH: &str = "withdraw";
const STATUS_PATH: &str = "status";
const SIGN_FIELD: &str = "sign";
const ORDER_MEMO: &str = "Order";
const SBP_BANK_CODE: &str = "ru_sberbank";
const FULL_NAME_CURRENCY: &str = "TRY";

const STATUS_PENDING: i64 = 0;
const STATUS_CONFIRMED: i64 = 2;
const STATUS_APPROVED: i64 = 3;
const STATUS_EXPIRED: i64 = 4;
const STATUS_CANCELLED: i64 = 5;

/// One payment method the gateway exposes, with the provider currency id
/// to use per ISO currency.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayMethod {
    pub id: String,
    #[serde(default)]
    pub gtw_id: HashMap<String, i64>,
    #[serde(default)]
    pub prefer_id: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayParams {
    pub transport: Transport,
    #[serde(default)]
    pub payment_methods: Vec<GatewayMethod>,
    #[serde(default)]
    pub payout_methods: Vec<GatewayMethod>,
    #[serde(default)]
    pub percentage_difference: Option<BigDecimal>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChannelParams {
    pub api_key: String,
    pub shop_id: i64,
}

#[derive(Debug, Default, Serialize)]
struct AurisRequest {
    #[serde(rename = "shopID")]
    shop_id: i64,
    #[serde(rename = "uniqID")]
    uniq_id: String,
    #[serde(rename = "currID")]
    curr_id: i64,
    amount: i64,
    label: String,
    #[serde(rename = "userID")]
    user_id: String,
    memo: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    bank_code: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    number: String,
    #[serde(rename = "statusURL", skip_serializing_if = "String::is_empty")]
    status_url: String,
    sign: String,
    #[serde(rename = "prefer", skip_serializing_if = "is_zero")]
    prefer_id: i64,
    #[serde(rename = "info", skip_serializing_if = "String::is_empty")]
    extra_info: String,
}

#[derive(Debug, Serialize)]
struct StatusRequest {
    #[serde(rename = "shopID")]
    shop_id: i64,
    id: String,
    sign: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AurisResponse {
    id: i64,
    number: String,
    #[serde(rename = "bankID")]
    bank_id: String,
    bank: String,
    error: String,
    nspk: String,
    #[serde(rename = "paymentLink")]
    payment_link: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusResponse {
    status: i64,
    #[serde(rename = "statusText")]
    status_text: String,
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AurisCallback {
    id: i64,
    status: i64,
    #[serde(rename = "statusText")]
    status_text: String,
    error: String,
}

pub struct Auris {
    ctx: AdapterContext,
    channel: ChannelParams,
    payment_methods: Vec<GatewayMethod>,
    payout_methods: Vec<GatewayMethod>,
}

impl Auris {
    pub fn new(ctx: AdapterContext, channel: ChannelParams, gateway: GatewayParams) -> Self {
        Self {
            ctx,
            channel,
            payment_methods: gateway.payment_methods,
            payout_methods: gateway.payout_methods,
        }
    }

    fn base_request(&self, txn: &Transaction, curr_id: i64) -> AurisRequest {
        AurisRequest {
            shop_id: self.channel.shop_id,
            uniq_id: txn.txn_id.to_string(),
            curr_id,
            amount: txn.amount_src,
            label: txn.txn_id.to_string(),
            user_id: txn
                .customer
                .as_ref()
                .map(|c| c.account_id.clone())
                .unwrap_or_default(),
            memo: ORDER_MEMO.to_string(),
            status_url: self.ctx.callback_url.clone(),
            ..AurisRequest::default()
        }
    }

    fn signed<T: Serialize>(&self, request: &T) -> Result<String, AcquirerError> {
        let value = serde_json::to_value(request)
            .map_err(|e| AcquirerError::validation(format!("request could not be encoded: {}", e)))?;
        signature(&value, &self.channel.api_key)
    }
}

#[async_trait]
impl Acquirer for Auris {
    fn key(&self) -> &'static str {
        KEY
    }

    async fn payment(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let method = find_method(&self.payment_methods, &txn.pay_method_id)?;
        let curr_id = currency_id(method, &txn.currency_src)?;

        let mut request = self.base_request(txn, curr_id);
        if matches!(txn.pay_method_id.as_str(), "p2pcarduzcard" | "p2pcardhumo") {
            request.prefer_id = method.prefer_id;
        }
        request.sign = self.signed(&request)?;

        let response: AurisResponse = self
            .ctx
            .client
            .post_json(DEPOSIT_PATH, &request, RequestOptions::default())
            .await?;

        if !response.error.is_empty() {
            return Ok(TransactionOutcome::provider_rejection(response.error, ""));
        }

        let mut outcome =
            TransactionOutcome::pending().with_gtw_txn_id(response.id.to_string());
        outcome.add_output(OUTPUT_CREDENTIALS, response.number);
        outcome.add_output_if_present("qr_data", &response.payment_link);

        let bank = match txn.pay_method_id.as_str() {
            "p2psbp" | "banktransfer" => response.nspk,
            "p2pcard" if !response.bank_id.is_empty() => response.bank_id,
            "p2pcard" => response.bank,
            _ => String::new(),
        };
        outcome.add_output_if_present(OUTPUT_BANK, &bank);

        Ok(outcome)
    }

    async fn payout(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let method = find_method(&self.payout_methods, &txn.pay_method_id)?;
        let curr_id = currency_id(method, &txn.currency_src)?;

        let mut request = self.base_request(txn, curr_id);
        match txn.pay_method_id.as_str() {
            "p2piban" | "p2pm10" | "p2pemanat" | "banktransfer" => {
                let account = txn.payment_data.object.credentials.trim();
                if account.is_empty() {
                    return Err(AcquirerError::validation("destination account is missing"));
                }
                request.number = account.to_string();
            }
            "sbp" => {
                let phone = txn
                    .customer
                    .as_ref()
                    .map(|c| c.phone.trim())
                    .unwrap_or_default();
                if phone.is_empty() {
                    return Err(AcquirerError::validation("customer phone is missing"));
                }
                request.number = phone.to_string();
                request.bank_code = SBP_BANK_CODE.to_string();
            }
            _ => {}
        }

        if txn.currency_src == FULL_NAME_CURRENCY {
            let full_name = txn.customer_full_name();
            if full_name.is_empty() {
                return Err(AcquirerError::validation("customer full name is required"));
            }
            request.extra_info = full_name.to_string();
        }
        request.sign = self.signed(&request)?;

        let response: AurisResponse = self
            .ctx
            .client
            .post_json(WITHDRAW_PATH, &request, RequestOptions::default())
            .await?;

        if !response.error.is_empty() {
            return Ok(TransactionOutcome::provider_rejection(response.error, ""));
        }

        Ok(TransactionOutcome::pending().with_gtw_txn_id(response.id.to_string()))
    }

    async fn handle_callback(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        let body = txn.callback_body().ok_or(AcquirerError::MissingCallback)?;
        let raw: Value = serde_json::from_str(body)
            .map_err(|e| AcquirerError::MalformedCallback(e.to_string()))?;

        let provided = raw
            .get(SIGN_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let payload = signature_payload(&raw, &self.channel.api_key)
            .ok_or_else(|| AcquirerError::authentication("auris callback has nothing to sign"))?;
        if !crypto::verify_digest(
            HashAlgorithm::Sha1,
            Encoding::Hex,
            payload.as_bytes(),
            provided,
        ) {
            return Err(AcquirerError::authentication(
                "auris callback signature mismatch",
            ));
        }

        let callback: AurisCallback = serde_json::from_value(raw)
            .map_err(|e| AcquirerError::MalformedCallback(e.to_string()))?;

        let mut outcome = TransactionOutcome::with_status(map_status(callback.status));
        if txn.gtw_txn_id.is_none() && callback.id != 0 {
            outcome = outcome.with_gtw_txn_id(callback.id.to_string());
        }
        if outcome.status == OutcomeStatus::Rejected {
            outcome.add_info(
                INFO_ERROR_MESSAGE,
                first_non_empty(&callback.error, &callback.status_text),
            );
        }
        Ok(outcome)
    }

    async fn finalize_pending(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        let mut request = StatusRequest {
            shop_id: self.channel.shop_id,
            id: require_gtw_txn_id(txn)?.to_string(),
            sign: String::new(),
        };
        request.sign = self.signed(&request)?;

        let response: StatusResponse = self
            .ctx
            .client
            .post_json(STATUS_PATH, &request, RequestOptions::default())
            .await?;

        Ok(match response.status {
            STATUS_APPROVED => TransactionOutcome::approved(),
            STATUS_CANCELLED => {
                let mut outcome = TransactionOutcome::rejected();
                outcome.add_info(
                    INFO_ERROR_MESSAGE,
                    first_non_empty(&response.error, &response.status_text),
                );
                outcome
            }
            STATUS_EXPIRED => TransactionOutcome::rejected()
                .with_error(TxnError::new(EXPIRED_ERROR_CODE, response.status_text)),
            other => TransactionOutcome::with_status(map_status(other)),
        })
    }
}

fn find_method<'a>(
    methods: &'a [GatewayMethod],
    method_id: &str,
) -> Result<&'a GatewayMethod, AcquirerError> {
    methods
        .iter()
        .find(|method| method.id == method_id)
        .ok_or_else(|| {
            AcquirerError::validation(format!("payment method {:?} is not configured", method_id))
        })
}

fn currency_id(method: &GatewayMethod, currency: &str) -> Result<i64, AcquirerError> {
    method.gtw_id.get(currency).copied().ok_or_else(|| {
        AcquirerError::validation(format!(
            "currency {} is not enabled for method {}",
            currency, method.id
        ))
    })
}

fn map_status(status: i64) -> OutcomeStatus {
    match status {
        STATUS_APPROVED => OutcomeStatus::Approved,
        STATUS_CANCELLED | STATUS_EXPIRED => OutcomeStatus::Rejected,
        STATUS_PENDING | STATUS_CONFIRMED => OutcomeStatus::Pending,
        other => unrecognized_status(KEY, &other.to_string()),
    }
}

fn first_non_empty<'a>(primary: &'a str, fallback: &'a str) -> &'a str {
    if primary.is_empty() {
        fallback
    } else {
        primary
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Canonical string signed by both sides, including the trailing key.
/// `None` when there is no field besides `sign`.
pub fn signature_payload(value: &Value, api_key: &str) -> Option<String> {
    let mut fields = BTreeMap::new();
    flatten("", value, &mut fields);
    fields.remove(SIGN_FIELD);
    if fields.is_empty() {
        return None;
    }

    let joined = fields.into_values().collect::<Vec<_>>().join(":");
    Some(format!("{}:{}", joined, api_key))
}

/// SHA-1 hex signature over [`signature_payload`].
pub fn signature(value: &Value, api_key: &str) -> Result<String, AcquirerError> {
    let payload = signature_payload(value, api_key)
        .ok_or_else(|| AcquirerError::validation("signature payload is empty"))?;
    Ok(crypto::digest_string(
        HashAlgorithm::Sha1,
        Encoding::Hex,
        payload.as_bytes(),
    ))
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    let key = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    match value {
        Value::Object(map) => {
            for (name, child) in map {
                flatten(&key(name), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&key(&index.to_string()), child, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Null => {
            out.insert(prefix.to_string(), String::new());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

pub fn callback_reference(body: &str) -> Result<String, serde_json::Error> {
    reference_field(body, CALLBACK_REFERENCE_FIELD)
}
