use serde_json::Value;

/// Masks credential-like fields in JSON payloads before they are logged.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

/// Parses `body` as JSON and sanitizes it. Non-JSON bodies are reduced to
/// their size.
pub fn sanitize_body(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => sanitize_json(&value).to_string(),
        Err(_) => format!("<{} bytes>", body.len()),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "credentials"
            | "card_number"
            | "target_card_number"
            | "p2p_destination"
            | "number"
            | "customer_address"
            | "cvv"
            | "password"
            | "secret"
            | "secret_key"
            | "callback_secret"
            | "token"
            | "access_token"
            | "signature_key"
            | "api_key"
            | "sign"
            | "signature"
            | "authorization"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 8 => {
            let chars: Vec<char> = s.chars().collect();
            let visible: String = chars[..4].iter().collect();
            let end: String = chars[chars.len() - 4..].iter().collect();
            Value::String(format!("{}****{}", visible, end))
        }
        _ => Value::String("****".to_string()),
    }
}
