//! Gateway and channel routing records.

use serde_json::Value;

/// A configured instance of an acquirer adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Gateway {
    pub id: i32,
    pub name: String,
    pub adapter_key: String,
    pub params: Value,
    pub is_active: bool,
}

/// Merchant credentials bound to a gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: i32,
    pub name: String,
    pub gateway_id: i32,
    pub params: Value,
    pub is_active: bool,
}

impl Channel {
    /// Credentials object handed to the adapter. Stored channel params wrap it
    /// under a `credentials` key; older rows keep it at the top level.
    pub fn credentials(&self) -> Value {
        match self.params.get("credentials") {
            Some(credentials) => credentials.clone(),
            None => self.params.clone(),
        }
    }
}

/// A resolved gateway and channel pair for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub gateway: Gateway,
    pub channel: Channel,
}
