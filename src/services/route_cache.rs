use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{Channel, Gateway, Route};
use crate::ports::{RepositoryResult, RouteRepository};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("Gateway not found: {0}")]
    GatewayNotFound(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Channel {channel} does not belong to gateway {gateway}")]
    ChannelMismatch { channel: String, gateway: String },
}

#[derive(Default)]
struct RouteTable {
    gateways: HashMap<String, Gateway>,
    channels: HashMap<String, Channel>,
}

/// Active gateways and channels, keyed by name. Loaded from the route
/// repository and swapped atomically on reload.
pub struct RouteCache {
    inner: ArcSwap<RouteTable>,
}

impl RouteCache {
    pub fn empty() -> Self {
        Self {
            inner: ArcSwap::from_pointee(RouteTable::default()),
        }
    }

    pub fn from_routes(gateways: Vec<Gateway>, channels: Vec<Channel>) -> Self {
        let cache = Self::empty();
        cache.store(gateways, channels);
        cache
    }

    pub async fn load(repository: &dyn RouteRepository) -> RepositoryResult<Self> {
        let cache = Self::empty();
        cache.reload(repository).await?;
        Ok(cache)
    }

    pub async fn reload(&self, repository: &dyn RouteRepository) -> RepositoryResult<()> {
        let gateways = repository.all_gateways().await?;
        let channels = repository.all_channels().await?;
        self.store(gateways, channels);

        let table = self.inner.load();
        tracing::info!(
            gateways = table.gateways.len(),
            channels = table.channels.len(),
            "Route cache loaded"
        );
        Ok(())
    }

    fn store(&self, gateways: Vec<Gateway>, channels: Vec<Channel>) {
        let table = RouteTable {
            gateways: gateways
                .into_iter()
                .filter(|g| g.is_active)
                .map(|g| (g.name.clone(), g))
                .collect(),
            channels: channels
                .into_iter()
                .filter(|c| c.is_active)
                .map(|c| (c.name.clone(), c))
                .collect(),
        };
        self.inner.store(Arc::new(table));
    }

    pub fn route(&self, gateway_name: &str, channel_name: &str) -> Result<Route, RouteError> {
        let table = self.inner.load();
        let gateway = table
            .gateways
            .get(gateway_name)
            .ok_or_else(|| RouteError::GatewayNotFound(gateway_name.to_string()))?;
        let channel = table
            .channels
            .get(channel_name)
            .ok_or_else(|| RouteError::ChannelNotFound(channel_name.to_string()))?;

        if channel.gateway_id != gateway.id {
            return Err(RouteError::ChannelMismatch {
                channel: channel.name.clone(),
                gateway: gateway.name.clone(),
            });
        }

        Ok(Route {
            gateway: gateway.clone(),
            channel: channel.clone(),
        })
    }
}
