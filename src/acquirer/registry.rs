//! Resolves a gateway + channel route to a configured adapter instance.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::acquirer::http::{
    circuit_state, join_url, new_circuit_breaker, CircuitBreaker, ProviderClient,
};
use crate::acquirer::providers::{
    alpex, asupay, auris, paylink, sequoia, AdapterContext, Transport,
};
use crate::acquirer::Acquirer;
use crate::domain::Route;

const BREAKER_FAILURE_THRESHOLD: u32 = 5;
const BREAKER_RESET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unsupported acquirer: {0}")]
    UnsupportedAcquirer(String),

    #[error("Invalid {section} configuration for {adapter}: {source}")]
    Config {
        adapter: String,
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP client for {adapter} could not be built: {source}")]
    HttpClient {
        adapter: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Typed configuration of one adapter, decoded from the gateway params and
/// the channel credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayConfig {
    Paylink {
        gateway: paylink::GatewayParams,
        channel: paylink::ChannelParams,
    },
    Sequoia {
        gateway: sequoia::GatewayParams,
        channel: sequoia::ChannelParams,
    },
    Auris {
        gateway: auris::GatewayParams,
        channel: auris::ChannelParams,
    },
    Alpex {
        gateway: alpex::GatewayParams,
        channel: alpex::ChannelParams,
    },
    Asupay {
        gateway: asupay::GatewayParams,
        channel: asupay::ChannelParams,
    },
}

impl GatewayConfig {
    pub fn decode(
        adapter_key: &str,
        channel: &Value,
        gateway: &Value,
    ) -> Result<Self, RegistryError> {
        Ok(match adapter_key {
            paylink::KEY => GatewayConfig::Paylink {
                gateway: decode_section(adapter_key, "gateway", gateway)?,
                channel: decode_section(adapter_key, "channel", channel)?,
            },
            sequoia::KEY => GatewayConfig::Sequoia {
                gateway: decode_section(adapter_key, "gateway", gateway)?,
                channel: decode_section(adapter_key, "channel", channel)?,
            },
            auris::KEY => GatewayConfig::Auris {
                gateway: decode_section(adapter_key, "gateway", gateway)?,
                channel: decode_section(adapter_key, "channel", channel)?,
            },
            alpex::KEY => GatewayConfig::Alpex {
                gateway: decode_section(adapter_key, "gateway", gateway)?,
                channel: decode_section(adapter_key, "channel", channel)?,
            },
            asupay::KEY => GatewayConfig::Asupay {
                gateway: decode_section(adapter_key, "gateway", gateway)?,
                channel: decode_section(adapter_key, "channel", channel)?,
            },
            other => return Err(RegistryError::UnsupportedAcquirer(other.to_string())),
        })
    }

    pub fn key(&self) -> &'static str {
        match self {
            GatewayConfig::Paylink { .. } => paylink::KEY,
            GatewayConfig::Sequoia { .. } => sequoia::KEY,
            GatewayConfig::Auris { .. } => auris::KEY,
            GatewayConfig::Alpex { .. } => alpex::KEY,
            GatewayConfig::Asupay { .. } => asupay::KEY,
        }
    }

    fn transport(&self) -> &Transport {
        match self {
            GatewayConfig::Paylink { gateway, .. } => &gateway.transport,
            GatewayConfig::Sequoia { gateway, .. } => &gateway.transport,
            GatewayConfig::Auris { gateway, .. } => &gateway.transport,
            GatewayConfig::Alpex { gateway, .. } => &gateway.transport.base,
            GatewayConfig::Asupay { gateway, .. } => &gateway.transport,
        }
    }
}

fn decode_section<T: DeserializeOwned>(
    adapter: &str,
    section: &'static str,
    value: &Value,
) -> Result<T, RegistryError> {
    T::deserialize(value).map_err(|source| RegistryError::Config {
        adapter: adapter.to_string(),
        section,
        source,
    })
}

/// Builds adapters on demand. Construction performs no I/O; the only state
/// kept across resolutions is one circuit breaker per gateway.
pub struct AcquirerRegistry {
    callback_base_url: String,
    default_timeout: Duration,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl AcquirerRegistry {
    pub fn new(callback_base_url: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            callback_base_url: callback_base_url.into(),
            default_timeout,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn supported_keys() -> [&'static str; 5] {
        [paylink::KEY, sequoia::KEY, auris::KEY, alpex::KEY, asupay::KEY]
    }

    /// Notification URL handed to the provider for one adapter key.
    pub fn callback_url(&self, adapter_key: &str) -> String {
        join_url(&self.callback_base_url, &format!("callback/{}", adapter_key))
    }

    pub fn resolve(&self, route: &Route) -> Result<Box<dyn Acquirer>, RegistryError> {
        let config = GatewayConfig::decode(
            &route.gateway.adapter_key,
            &route.channel.credentials(),
            &route.gateway.params,
        )?;
        let key = config.key();

        let span = tracing::info_span!(
            "acquirer",
            gateway = %route.gateway.name,
            channel = %route.channel.name,
            adapter = key,
        );

        let transport = config.transport();
        let timeout = transport.timeout_or(self.default_timeout);
        let client = ProviderClient::new(
            transport.base_address.clone(),
            timeout,
            self.breaker_for(&route.gateway.name),
            span,
        )
        .map_err(|source| RegistryError::HttpClient {
            adapter: key.to_string(),
            source,
        })?;
        let ctx = AdapterContext {
            client,
            callback_url: self.callback_url(key),
        };

        tracing::debug!(gateway = %route.gateway.name, adapter = key, "Resolved acquirer");

        Ok(match config {
            GatewayConfig::Paylink { channel, .. } => {
                Box::new(paylink::Paylink::new(ctx, channel))
            }
            GatewayConfig::Sequoia { gateway, channel } => {
                Box::new(sequoia::Sequoia::new(ctx, channel, gateway))
            }
            GatewayConfig::Auris { gateway, channel } => {
                Box::new(auris::Auris::new(ctx, channel, gateway))
            }
            GatewayConfig::Alpex { gateway, channel } => {
                Box::new(alpex::Alpex::new(ctx, channel, gateway))
            }
            GatewayConfig::Asupay { channel, .. } => Box::new(asupay::Asupay::new(ctx, channel)),
        })
    }

    /// Circuit state per gateway that has been resolved at least once.
    pub fn circuit_states(&self) -> BTreeMap<String, &'static str> {
        let breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        breakers
            .iter()
            .map(|(gateway, breaker)| (gateway.clone(), circuit_state(breaker)))
            .collect()
    }

    fn breaker_for(&self, gateway_name: &str) -> CircuitBreaker {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        breakers
            .entry(gateway_name.to_string())
            .or_insert_with(|| new_circuit_breaker(BREAKER_FAILURE_THRESHOLD, BREAKER_RESET_TIMEOUT))
            .clone()
    }
}
