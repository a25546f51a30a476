//! Sequoia: P2P card deposits. Requests carry an MD5 token, callbacks are
//! signed with the channel's callback secret and may report a settled amount
//! different from the requested one.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

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

pub const KEY: &str = "sequoia";

pub const CALLBACK_REFERENCE_FIELD: &str = "order_id";

const PAYMENT_PATH: &str = "api/pay";
const ORDER_PATH: &str = "api/order";
const P2P_PAYMENT_METHOD: i32 = 1;
const REPLY_OK: &str = "ok";

const STATUS_SUCCESS: &str = "success";
const STATUS_FAIL: &str = "fail";
const STATUS_EXPIRED: &str = "expired";
const STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayParams {
    pub transport: Transport,
    /// Largest accepted deviation, in percent, between the requested amount
    /// and the amount the provider settled.
    #[serde(default)]
    pub percentage_difference: Option<BigDecimal>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChannelParams {
    pub secret_key: String,
    pub callback_secret: String,
}

#[derive(Debug, Serialize)]
struct PaymentRequest<'a> {
    order_id: String,
    amount: BigDecimal,
    payment_method: i32,
    token: String,
    currency: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderRequest {
    order_id: String,
    token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CardDetails {
    target_card_number: String,
    holder: String,
    bank_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PaymentResponse {
    status: String,
    data: CardDetails,
    message: String,
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrderData {
    status: String,
    currency: String,
    amount: Option<BigDecimal>,
    new_amount: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrderResponse {
    status: String,
    data: OrderData,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SequoiaCallback {
    pub order_id: String,
    pub date: String,
    pub amount: Option<BigDecimal>,
    pub new_amount: String,
    pub card_number: String,
    pub payment_type: i32,
    pub status: String,
    pub sign: String,
}

impl SequoiaCallback {
    /// Canonical string the provider signs.
    pub fn signature_payload(&self, callback_secret: &str) -> String {
        format!("{}{}{}", self.order_id, self.status, callback_secret)
    }
}

pub struct Sequoia {
    ctx: AdapterContext,
    channel: ChannelParams,
    percentage_difference: Option<BigDecimal>,
}

impl Sequoia {
    pub fn new(ctx: AdapterContext, channel: ChannelParams, gateway: GatewayParams) -> Self {
        Self {
            ctx,
            channel,
            percentage_difference: gateway.percentage_difference,
        }
    }

    fn token(&self, order_id: &str) -> String {
        crypto::digest_string(
            HashAlgorithm::Md5,
            Encoding::Hex,
            format!("{}{}", order_id, self.channel.secret_key).as_bytes(),
        )
    }

    /// Returns the settled amount in whole units when the provider reported
    /// one, failing when it strays too far from the requested amount.
    fn converted_amount(
        &self,
        amount: Option<&BigDecimal>,
        new_amount: &str,
    ) -> Result<Option<i64>, AcquirerError> {
        let new_amount = new_amount.trim();
        if new_amount.is_empty() {
            return Ok(None);
        }

        let reported = BigDecimal::from_str(new_amount).map_err(|e| AcquirerError::Decode {
            status: 200,
            message: format!("new_amount {:?}: {}", new_amount, e),
        })?;

        if let (Some(pct), Some(requested)) = (&self.percentage_difference, amount) {
            let delta = requested * pct / BigDecimal::from(100);
            if (requested - &reported).abs() >= delta {
                tracing::warn!(
                    requested = %requested,
                    reported = %reported,
                    "sequoia reported amount is outside tolerance"
                );
                return Err(AcquirerError::AmountOutOfTolerance {
                    requested: requested.to_string(),
                    reported: reported.to_string(),
                });
            }
        }

        whole_units(&reported).map(Some)
    }
}

/// Converts a reported amount to the integer units requests are sent in.
/// Fractional amounts are refused rather than rounded.
fn whole_units(reported: &BigDecimal) -> Result<i64, AcquirerError> {
    let whole = reported.with_scale(0);
    if &whole != reported {
        return Err(AcquirerError::Decode {
            status: 200,
            message: format!("new_amount {} is not a whole amount", reported),
        });
    }
    whole
        .to_string()
        .parse::<i64>()
        .map_err(|e| AcquirerError::Decode {
            status: 200,
            message: format!("new_amount {}: {}", reported, e),
        })
}

#[async_trait]
impl Acquirer for Sequoia {
    fn key(&self) -> &'static str {
        KEY
    }

    async fn payment(&self, txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        let order_id = txn.txn_id.to_string();
        let request = PaymentRequest {
            token: self.token(&order_id),
            order_id,
            amount: BigDecimal::from(txn.amount_src),
            payment_method: P2P_PAYMENT_METHOD,
            currency: &txn.currency_src,
            callback_url: &self.ctx.callback_url,
        };

        let response: PaymentResponse = self
            .ctx
            .client
            .post_json(PAYMENT_PATH, &request, RequestOptions::default())
            .await?;

        if response.status != REPLY_OK {
            return Ok(TransactionOutcome::provider_rejection(
                response.code,
                response.message,
            ));
        }

        let mut outcome = TransactionOutcome::pending();
        outcome.add_output(OUTPUT_CREDENTIALS, response.data.target_card_number);
        outcome.add_output_if_present(OUTPUT_BANK, &response.data.bank_name);
        outcome.add_output_if_present(OUTPUT_DESCRIPTION, &response.data.holder);
        Ok(outcome)
    }

    async fn payout(&self, _txn: &Transaction) -> Result<TransactionOutcome, AcquirerError> {
        Ok(TransactionOutcome::unsupported_method())
    }

    async fn handle_callback(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        let callback: SequoiaCallback = parse_callback(txn)?;

        if !crypto::verify_digest(
            HashAlgorithm::Md5,
            Encoding::Hex,
            callback
                .signature_payload(&self.channel.callback_secret)
                .as_bytes(),
            &callback.sign,
        ) {
            return Err(AcquirerError::authentication(
                "sequoia callback signature mismatch",
            ));
        }

        let converted = self.converted_amount(callback.amount.as_ref(), &callback.new_amount)?;
        final_outcome(&callback.status, converted, &txn.currency_src)
    }

    async fn finalize_pending(
        &self,
        txn: &Transaction,
    ) -> Result<TransactionOutcome, AcquirerError> {
        let order_id = txn.txn_id.to_string();
        let request = OrderRequest {
            token: self.token(&order_id),
            order_id,
        };

        let response: OrderResponse = self
            .ctx
            .client
            .send_json(Method::GET, ORDER_PATH, Some(&request), RequestOptions::default())
            .await?;

        if response.status != REPLY_OK {
            tracing::warn!(message = %response.message, "sequoia order lookup failed");
            return Ok(TransactionOutcome::pending());
        }

        let converted =
            self.converted_amount(response.data.amount.as_ref(), &response.data.new_amount)?;
        let currency = if response.data.currency.is_empty() {
            txn.currency_src.as_str()
        } else {
            response.data.currency.as_str()
        };
        final_outcome(&response.data.status, converted, currency)
    }
}

fn final_outcome(
    status: &str,
    converted: Option<i64>,
    currency: &str,
) -> Result<TransactionOutcome, AcquirerError> {
    let mut outcome = TransactionOutcome::with_status(map_status(status));
    if outcome.status == OutcomeStatus::Rejected {
        outcome.add_info(INFO_ERROR_MESSAGE, status);
    }
    if let Some(amount) = converted.filter(|amount| *amount != 0) {
        outcome.set_converted_amount(amount, currency)?;
    }
    Ok(outcome)
}

fn map_status(status: &str) -> OutcomeStatus {
    match status {
        STATUS_SUCCESS => OutcomeStatus::Approved,
        STATUS_FAIL | STATUS_EXPIRED => OutcomeStatus::Rejected,
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
        assert_eq!(map_status("success"), OutcomeStatus::Approved);
        assert_eq!(map_status("fail"), OutcomeStatus::Rejected);
        assert_eq!(map_status("expired"), OutcomeStatus::Rejected);
        assert_eq!(map_status("pending"), OutcomeStatus::Pending);
        assert_eq!(map_status("on_review"), OutcomeStatus::Pending);
    }

    #[test]
    fn test_rejected_outcome_carries_status_message() {
        let outcome = final_outcome("expired", None, "RUB").unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
        assert_eq!(
            outcome.info.get(INFO_ERROR_MESSAGE).map(String::as_str),
            Some("expired")
        );
    }

    #[test]
    fn test_whole_units_refuses_fractions() {
        let whole = |raw: &str| whole_units(&BigDecimal::from_str(raw).unwrap());
        assert_eq!(whole("9500").unwrap(), 9500);
        assert_eq!(whole("9500.00").unwrap(), 9500);
        assert!(matches!(whole("950.75"), Err(AcquirerError::Decode { .. })));
        assert!(matches!(whole("1e30"), Err(AcquirerError::Decode { .. })));
    }

    #[test]
    fn test_converted_amount_recorded() {
        let outcome = final_outcome("success", Some(950), "RUB").unwrap();
        let converted = outcome.converted_amount.unwrap();
        assert_eq!(converted.amount, 950);
        assert_eq!(converted.currency, "RUB");
    }
}
