use std::fmt;

use crate::services::payment_service::PaymentRequest;

pub const ROUTE_NAME_MAX_LEN: usize = 64;
pub const CURRENCY_CODE_LEN: usize = 3;
pub const PAY_METHOD_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_route_name(field: &'static str, value: &str) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, ROUTE_NAME_MAX_LEN)
}

/// ISO 4217 alphabetic code: exactly three uppercase letters.
pub fn validate_currency(currency: &str) -> ValidationResult {
    validate_required("amount.currency", currency)?;

    if currency.len() != CURRENCY_CODE_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "amount.currency",
            "must be a three-letter uppercase ISO 4217 code",
        ));
    }

    Ok(())
}

/// Amounts are integer minor units.
pub fn validate_positive_amount(value: i64) -> ValidationResult {
    if value <= 0 {
        return Err(ValidationError::new("amount.value", "must be greater than zero"));
    }

    Ok(())
}

/// Checks an inbound payment or payout request before a transaction is
/// created from it. Provider-specific requirements are left to the adapters.
pub fn validate_payment_request(request: &PaymentRequest) -> ValidationResult {
    validate_route_name("gtw_name", &request.gtw_name)?;
    validate_route_name("chn_name", &request.chn_name)?;
    validate_positive_amount(request.amount.value)?;
    validate_currency(&request.amount.currency)?;
    validate_max_len(
        "payment_data.type",
        &request.payment_data.method,
        PAY_METHOD_MAX_LEN,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentData;
    use crate::services::payment_service::Amount;

    fn request() -> PaymentRequest {
        PaymentRequest {
            customer: None,
            payment_data: PaymentData::default(),
            amount: Amount {
                value: 10_000,
                currency: "USD".to_string(),
            },
            gtw_name: "paylink-eu".to_string(),
            chn_name: "merchant-1".to_string(),
        }
    }

    #[test]
    fn test_sanitize_string_collapses_whitespace() {
        assert_eq!(sanitize_string("  a\tb \u{0007}c  "), "a b c");
    }

    #[test]
    fn test_valid_request() {
        assert!(validate_payment_request(&request()).is_ok());
    }

    #[test]
    fn test_missing_gateway_name() {
        let mut req = request();
        req.gtw_name = "  ".to_string();
        let err = validate_payment_request(&req).unwrap_err();
        assert_eq!(err.field, "gtw_name");
    }

    #[test]
    fn test_non_positive_amount() {
        let mut req = request();
        req.amount.value = 0;
        assert_eq!(
            validate_payment_request(&req).unwrap_err().field,
            "amount.value"
        );
    }

    #[test]
    fn test_currency_format() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("eur").is_err());
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("").is_err());
    }

    #[test]
    fn test_route_name_length() {
        let long = "x".repeat(ROUTE_NAME_MAX_LEN + 1);
        assert!(validate_route_name("chn_name", &long).is_err());
    }
}
