//! Alpex: buy and sell offers behind a bearer login. Callbacks are signed
//! with a per-account key obtained from the API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::acquirer::http::RequestOptions;
use crate::acquirer::outcome::{
    OutcomeStatus, TransactionOutcome, INFO_ERROR_MESSAGE, OUTPUT_BANK, OUTPUT_CREDENTIALS,
    OUTPUT_DESCRIPTION,
};
use crate::acquirer::providers::{
    parse_callback, reference_field, unrecognized_status, AdapterContext, Transport,
};
use crate::acquirer::{Acquirer, AcquirerError};
use crate::crypto::{self, Encoding, HashAlgorithm};
use crate::domain::Transaction;

pub const KEY: &str = "alpex";

pub const CALLBACK_REFERENCE_FIELD: &str = "external_id";

const LOGIN_PATH: &str = "v1/auth/login";
const SIGNATURE_KEY_PATH: &str = "v1/user/generate-signature-key";
const OFFER_PATH: &str = "v1/offer/external";

const DIRECTION_BUY: &str = "BUY";
const DIRECTION_SELL: &str = "SELL";

const STATUS_PENDING: &str = "PENDING";
const STATUS_RELEASED: &str = "RELEASED";
const STATUS_CANCELLED: &str = "CANCELLED";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AlpexTransport {
    #[serde(flatten)]
    pub base: Transport,
    /// Overrides the notification URL derived from the public base URL.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayParams {
    pub transport: AlpexTransport,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChannelParams {
    #[serde(default)]
    pub gate_id: String,
    pub login: Login,
}

#[derive(Debug, Serialize)]
struct OfferRequest<'a> {
    fiat_symbol: &'a str,
    fiat_amount: i64,
    #[serde(skip_serializing_if = "str::is_empty")]
    customer_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    customer_address: &'a str,
    direction: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    gate_id: &'a str,
    external_id: String,
    webhook_url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SignatureKeyResponse {
    signature_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Gate {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PaymentMethod {
    gate: Gate,
    person: String,
    address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OfferResponse {
    id: String,
    status: String,
    payment_method: PaymentMethod,
    message: String,
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AlpexCallback {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: String,
    pub description: String,
    pub signature: String,
    pub external_id: String,
}

impl AlpexCallback {
    /// Canonical string the provider signs.
    pub fn signature_payload(&self) -> String {
        format!("id={}\nstatus={}", self.id, self.status)
    }
}

pub struct Alpex {
    ctx: AdapterContext,
    channel: ChannelParams,
}

impl Alpex {
    pub fn new(ctx: AdapterContext, channel: ChannelParams, gateway: GatewayParams) -> Self {
        let mut ctx = ctx;
        if let Some(webhook_url) = gateway
            .transport
            .webhook_url
            .filter(|url| !url.trim().is_empty())
        {
            ctx.callback_url = webhook_url;
        }
        Self { ctx, channel }
    }

    async fn access_token(&self) -> Result<String, AcquirerError> {
        let response: TokenResponse = self
            .ctx
            .client
            .post_json(LOGIN_PATH, &self.channel.login, RequestOptions::default())
            .await?;
        if response.access_token.is_empty() {
            return Err(AcquirerError::authentication("alpex login returned no token"));
        }
        Ok(response.access_token)
    }

    async fn signature_key(&self) -> Result<String, AcquirerError> {
        let token = self.access_token().await?;
        let response: SignatureKeyResponse = self
            .ctx
            .client
            .post_json(
                SIGNATURE_KEY_PATH,
                &self.channel.login,
                RequestOptions::default().bearer(&token),
            )
            .await?;
        if response.signature_key.is_empty() {
            return Err(AcquirerError::authentication(
                "alpex returned no signature key",
            ));
        }
        Ok(response.signature_key)
    }

    async fn create_offer(&self, request: &OfferRequest<'_>) -> Result<OfferResponse, AcquirerError> {
        let token = self.access_token().await?;
        self.ctx
            .client
            .post_json(OFFER_PATH, request, RequestOptions::default().bearer(&token))
            .await
    }
}

#[async_trait]
impl Acquirer for Alpex {
    fn key(&self) -> &'static str {
        KEY
    }

    async fn payment(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let request = OfferRequest {
            fiat_symbol: &txn.currency_src,
            fiat_amount: txn.amount_src,
            customer_name: "",
            customer_address: "",
            direction: DIRECTION_BUY,
            gate_id: "",
            external_id: txn.txn_id.to_string(),
            webhook_url: &self.ctx.callback_url,
        };

        let response = self.create_offer(&request).await?;
        if response.status != STATUS_PENDING {
            return Ok(TransactionOutcome::provider_rejection(
                response.code,
                response.message,
            ));
        }

        let mut outcome = TransactionOutcome::pending().with_gtw_txn_id(response.id);
        outcome.add_output(OUTPUT_CREDENTIALS, response.payment_method.address);
        outcome.add_output_if_present(OUTPUT_BANK, &response.payment_method.gate.name);
        outcome.add_output_if_present(OUTPUT_DESCRIPTION, &response.payment_method.person);
        Ok(outcome)
    }

    async fn payout(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let customer_name = txn.customer_full_name();
        if customer_name.is_empty() {
            return Err(AcquirerError::validation("customer full name is required"));
        }
        let destination = txn.payment_data.object.credentials.trim();
        if destination.is_empty() {
            return Err(AcquirerError::validation("payout destination is missing"));
        }

        let request = OfferRequest {
            fiat_symbol: &txn.currency_src,
            fiat_amount: txn.amount_src,
            customer_name,
            customer_address: destination,
            direction: DIRECTION_SELL,
            gate_id: &self.channel.gate_id,
            external_id: txn.txn_id.to_string(),
            webhook_url: &self.ctx.callback_url,
        };

        let response = self.create_offer(&request).await?;
        if response.status != STATUS_PENDING {
            return Ok(TransactionOutcome::provider_rejection(
                response.code,
                response.message,
            ));
        }

        Ok(TransactionOutcome::pending().with_gtw_txn_id(response.id))
    }

    async fn handle_callback(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        let callback: AlpexCallback = parse_callback(txn)?;
        if callback.id.is_empty() {
            return Err(AcquirerError::MalformedCallback(
                "alpex callback has no offer id".to_string(),
            ));
        }

        let key = self.signature_key().await?;
        if !crypto::verify_signature(
            HashAlgorithm::Sha256,
            Encoding::Hex,
            callback.signature_payload().as_bytes(),
            key.as_bytes(),
            &callback.signature,
        ) {
            return Err(AcquirerError::authentication(
                "alpex callback signature mismatch",
            ));
        }

        tracing::info!(provider_status = %callback.status, "alpex callback verified");
        let mut outcome = TransactionOutcome::with_status(map_status(&callback.status));
        if !callback.description.is_empty() {
            outcome.add_info(INFO_ERROR_MESSAGE, callback.description);
        }
        Ok(outcome)
    }

    async fn finalize_pending(
        &self,
        _txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        Ok(TransactionOutcome::unsupported_method())
    }
}

fn map_status(status: &str) -> OutcomeStatus {
    match status {
        STATUS_RELEASED => OutcomeStatus::Approved,
        STATUS_CANCELLED => OutcomeStatus::Rejected,
        STATUS_PENDING => OutcomeStatus::Pending,
        other => unrecognized_status(KEY, other),
    }
}

pub fn callback_reference(body: &str) -> Result<String, serde_json::Error> {
    reference_field(body, CALLBACK_REFERENCE_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_map() {
        assert_eq!(map_status("RELEASED"), OutcomeStatus::Approved);
        assert_eq!(map_status("CANCELLED"), OutcomeStatus::Rejected);
        assert_eq!(map_status("PENDING"), OutcomeStatus::Pending);
        assert_eq!(map_status("DISPUTE"), OutcomeStatus::Pending);
    }

    #[test]
    fn test_signature_payload() {
        let callback = AlpexCallback {
            id: "off-1".to_string(),
            status: "RELEASED".to_string(),
            ..Default::default()
        };
        assert_eq!(callback.signature_payload(), "id=off-1\nstatus=RELEASED");
    }

    #[test]
    fn test_channel_params_decode() {
        let params: ChannelParams = serde_json::from_value(serde_json::json!({
            "gate_id": "g-7",
            "login": {"email": "ops@example.com", "password": "pw"}
        }))
        .unwrap();
        assert_eq!(params.gate_id, "g-7");
        assert_eq!(params.login.email, "ops@example.com");
    }
}
