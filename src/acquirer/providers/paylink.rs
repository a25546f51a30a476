//! Paylink: P2P deposits and payouts over JSON, requests signed with a
//! base64 HMAC-SHA1 `Sign` header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::acquirer::http::RequestOptions;
use crate::acquirer::outcome::{
    OutcomeStatus, TransactionOutcome, INFO_ERROR_CODE, INFO_ERROR_MESSAGE, OUTPUT_BANK,
    OUTPUT_CREDENTIALS, OUTPUT_DESCRIPTION,
};
use crate::acquirer::providers::{
    parse_callback, reference_field, require_gtw_txn_id, unrecognized_status, AdapterContext,
    Transport,
};
use crate::acquirer::{Acquirer, AcquirerError};
use crate::crypto::{self, Encoding, HashAlgorithm};
use crate::domain::Transaction;

pub const KEY: &str = "paylink";

/// Field of the callback body carrying our transaction id.
pub const CALLBACK_REFERENCE_FIELD: &str = "user_ref";

const PAYMENT_PATH: &str = "payment";
const PAYOUT_PATH: &str = "payout";
const STATUS_PATH: &str = "status";
const PAYOUT_SIGN_PREFIX: &str = "payout";

const STATUS_NEW: &str = "new";
const STATUS_EXECUTED: &str = "executed";
const STATUS_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayParams {
    pub transport: Transport,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChannelParams {
    pub api_key: String,
    pub merch_id: String,
}

#[derive(Debug, Serialize)]
struct PaylinkRequest<'a> {
    merch_id: &'a str,
    extra: &'a str,
    amount: String,
    currency: &'a str,
    notification_url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    user_id: &'a str,
    user_ref: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    user_ip: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    p2p_destination: &'a str,
    finish_url: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    id: &'a str,
    merch_id: &'a str,
    user_ref: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PaylinkResponse {
    ok: bool,
    status: String,
    id: String,
    url: String,
    p2p_destination: String,
    p2p_bank: String,
    p2p_name: String,
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaylinkCallback {
    pub id: String,
    pub user_ref: String,
    pub status: String,
    pub description: String,
    pub timestamp_updated: String,
    pub amount: String,
    pub sign: String,
}

pub struct Paylink {
    ctx: AdapterContext,
    channel: ChannelParams,
}

impl Paylink {
    pub fn new(ctx: AdapterContext, channel: ChannelParams) -> Self {
        Self { ctx, channel }
    }

    fn sign(&self, input: &str) -> Result<String, AcquirerError> {
        Ok(crypto::sign(
            HashAlgorithm::Sha1,
            Encoding::Base64,
            input.as_bytes(),
            self.channel.api_key.as_bytes(),
        )?)
    }

    fn build_request<'a>(&'a self, txn: &'a Transaction) -> PaylinkRequest<'a> {
        let customer = txn.customer.as_ref();
        PaylinkRequest {
            merch_id: &self.channel.merch_id,
            extra: &txn.pay_method_id,
            amount: txn.amount_src.to_string(),
            currency: &txn.currency_src,
            notification_url: &self.ctx.callback_url,
            user_id: customer.map(|c| c.account_id.as_str()).unwrap_or_default(),
            user_ref: txn.txn_id.to_string(),
            user_ip: customer.map(|c| c.ip.as_str()).unwrap_or_default(),
            p2p_destination: "",
            finish_url: "",
        }
    }

    fn map_reply(&self, response: PaylinkResponse) -> TransactionOutcome {
        if !response.ok {
            return TransactionOutcome::provider_rejection(response.error, "");
        }

        let status = map_status(&response.status);
        if status == OutcomeStatus::Rejected {
            return TransactionOutcome::provider_rejection(response.error, "")
                .with_gtw_txn_id(response.id);
        }

        let mut outcome = TransactionOutcome::with_status(status).with_gtw_txn_id(response.id);
        outcome.add_output_if_present(OUTPUT_CREDENTIALS, &response.p2p_destination);
        outcome.add_output_if_present(OUTPUT_BANK, &response.p2p_bank);
        outcome.add_output_if_present(OUTPUT_DESCRIPTION, &response.p2p_name);
        outcome.add_output_if_present("payment_url", &response.url);
        outcome
    }
}

#[async_trait]
impl Acquirer for Paylink {
    fn key(&self) -> &'static str {
        KEY
    }

    async fn payment(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let request = self.build_request(txn);
        let sign = self.sign(&self.channel.merch_id)?;

        let response: PaylinkResponse = self
            .ctx
            .client
            .post_json(PAYMENT_PATH, &request, RequestOptions::default().header("Sign", sign))
            .await?;

        Ok(self.map_reply(response))
    }

    async fn payout(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let destination = txn.payment_data.object.credentials.trim();
        if destination.is_empty() {
            return Err(AcquirerError::validation("payout destination is missing"));
        }

        let mut request = self.build_request(txn);
        request.p2p_destination = destination;
        let sign = self.sign(&format!("{}{}", PAYOUT_SIGN_PREFIX, request.user_ref))?;

        let response: PaylinkResponse = self
            .ctx
            .client
            .post_json(PAYOUT_PATH, &request, RequestOptions::default().header("Sign", sign))
            .await?;

        let mut outcome = self.map_reply(response);
        outcome.outputs.clear();
        Ok(outcome)
    }

    async fn handle_callback(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        let callback: PaylinkCallback = parse_callback(txn)?;

        if !crypto::verify_signature(
            HashAlgorithm::Sha1,
            Encoding::Base64,
            callback.id.as_bytes(),
            self.channel.api_key.as_bytes(),
            &callback.sign,
        ) {
            return Err(AcquirerError::authentication(
                "paylink callback signature mismatch",
            ));
        }

        let mut outcome =
            TransactionOutcome::with_status(map_status(&callback.status)).with_gtw_txn_id(callback.id);
        if !callback.description.is_empty() {
            outcome.add_info(INFO_ERROR_MESSAGE, callback.description);
        }
        Ok(outcome)
    }

    async fn finalize_pending(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        let gtw_txn_id = require_gtw_txn_id(txn)?;
        let request = StatusRequest {
            id: gtw_txn_id,
            merch_id: &self.channel.merch_id,
            user_ref: txn.txn_id.to_string(),
        };
        let sign = self.sign(gtw_txn_id)?;

        let response: PaylinkResponse = self
            .ctx
            .client
            .post_json(STATUS_PATH, &request, RequestOptions::default().header("Sign", sign))
            .await?;

        if !response.ok {
            tracing::warn!(error = %response.error, "paylink status lookup failed");
            let mut outcome = TransactionOutcome::pending();
            outcome.add_info(INFO_ERROR_CODE, response.error);
            return Ok(outcome);
        }

        Ok(TransactionOutcome::with_status(map_status(&response.status)))
    }
}

fn map_status(status: &str) -> OutcomeStatus {
    match status {
        STATUS_EXECUTED => OutcomeStatus::Approved,
        STATUS_CANCELLED => OutcomeStatus::Rejected,
        STATUS_NEW => OutcomeStatus::Pending,
        other => unrecognized_status(KEY, other),
    }
}

/// Extracts our transaction id from a raw paylink callback body.
pub fn callback_reference(body: &str) -> Result<String, serde_json::Error> {
    reference_field(body, CALLBACK_REFERENCE_FIELD)
}
