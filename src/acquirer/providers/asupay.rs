//! Asupay: card payouts only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::acquirer::http::RequestOptions;
use crate::acquirer::outcome::{OutcomeStatus, TransactionOutcome};
use crate::acquirer::providers::{unrecognized_status, AdapterContext, Transport};
use crate::acquirer::{Acquirer, AcquirerError};
use crate::crypto::{self, Encoding, HashAlgorithm};
use crate::domain::Transaction;

pub const KEY: &str = "asupay";

const WITHDRAW_PATH: &str = "api/v1/withdraw";

const STATUS_SUCCESS: &str = "success";
const STATUS_DECLINE: &str = "decline";
const STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayParams {
    pub transport: Transport,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChannelParams {
    pub merchant: String,
    pub secret_key: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct CardData<'a> {
    card_number: &'a str,
}

#[derive(Debug, Serialize)]
struct WithdrawRequest<'a> {
    withdraw_id: String,
    merchant: &'a str,
    amount: String,
    card_data: CardData<'a>,
    signature: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WithdrawResponse {
    ok: bool,
    status: String,
    id: String,
    message: String,
    code: String,
}

pub struct Asupay {
    ctx: AdapterContext,
    channel: ChannelParams,
}

impl Asupay {
    pub fn new(ctx: AdapterContext, channel: ChannelParams) -> Self {
        Self { ctx, channel }
    }

    fn signature(&self, card_number: &str, amount: &str) -> String {
        signature_of(
            &self.channel.merchant,
            &self.channel.secret_key,
            card_number,
            amount,
        )
    }
}

#[async_trait]
impl Acquirer for Asupay {
    fn key(&self) -> &'static str {
        KEY
    }

    async fn payment(&self, _txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        Ok(TransactionOutcome::unsupported_method())
    }

    async fn payout(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let card_number = txn.payment_data.object.credentials.trim();
        if card_number.is_empty() {
            return Err(AcquirerError::validation("card number is missing"));
        }

        let amount = txn.amount_src.to_string();
        let signature = self.signature(card_number, &amount);
        let request = WithdrawRequest {
            withdraw_id: txn.txn_id.to_string(),
            merchant: &self.channel.merchant,
            amount,
            card_data: CardData { card_number },
            signature: signature.clone(),
        };

        let response: WithdrawResponse = self
            .ctx
            .client
            .post_json(
                WITHDRAW_PATH,
                &request,
                RequestOptions::default()
                    .header("Sign", signature)
                    .bearer(&self.channel.api_key),
            )
            .await?;

        if !response.ok || response.status == STATUS_DECLINE {
            let code = if response.code.is_empty() {
                response.status.clone()
            } else {
                response.code
            };
            return Ok(TransactionOutcome::provider_rejection(code, response.message)
                .with_gtw_txn_id(response.id));
        }

        Ok(TransactionOutcome::with_status(map_status(&response.status))
            .with_gtw_txn_id(response.id))
    }

    async fn handle_callback(
        &self,
        _txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        Ok(TransactionOutcome::unsupported_method())
    }

    async fn finalize_pending(
        &self,
        _txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        Ok(TransactionOutcome::unsupported_method())
    }
}

/// SHA-256 hex over merchant, card number, amount and secret key.
fn signature_of(merchant: &str, secret_key: &str, card_number: &str, amount: &str) -> String {
    crypto::digest_string(
        HashAlgorithm::Sha256,
        Encoding::Hex,
        format!("{}{}{}{}", merchant, card_number, amount, secret_key).as_bytes(),
    )
}

fn map_status(status: &str) -> OutcomeStatus {
    match status {
        STATUS_SUCCESS => OutcomeStatus::Approved,
        STATUS_DECLINE => OutcomeStatus::Rejected,
        STATUS_PENDING => OutcomeStatus::Pending,
        other => unrecognized_status(KEY, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_map() {
        assert_eq!(map_status("success"), OutcomeStatus::Approved);
        assert_eq!(map_status("decline"), OutcomeStatus::Rejected);
        assert_eq!(map_status("pending"), OutcomeStatus::Pending);
        assert_eq!(map_status("queued"), OutcomeStatus::Pending);
    }

    #[test]
    fn test_signature_covers_merchant_card_amount_and_secret() {
        let expected = crypto::digest_string(
            HashAlgorithm::Sha256,
            Encoding::Hex,
            b"m-14111111111111111500sk",
        );
        assert_eq!(signature_of("m-1", "sk", "4111111111111111", "500"), expected);
    }
}
