//! Postgres implementation of RouteRepository over the `gateway` and
//! `channel` tables.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::{Channel, Gateway};
use crate::ports::{RepositoryError, RepositoryResult, RouteRepository};

#[derive(Clone)]
pub struct PostgresRouteRepository {
    pool: PgPool,
}

impl PostgresRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RouteRepository for PostgresRouteRepository {
    async fn gateway_by_name(&self, name: &str) -> RepositoryResult<Option<Gateway>> {
        let row = sqlx::query_as::<_, GatewayRow>(
            r#"
            SELECT gtw_id, gtw_name, gtw_adapter_id, gtw_params_jsonb, gtw_is_active
            FROM gateway
            WHERE gtw_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(GatewayRow::into_domain))
    }

    async fn channel_by_name(&self, name: &str) -> RepositoryResult<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT chn_id, chn_name, chn_is_active, gtw_id, chn_params_jsonb
            FROM channel
            WHERE chn_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(ChannelRow::into_domain))
    }

    async fn all_gateways(&self) -> RepositoryResult<Vec<Gateway>> {
        let rows = sqlx::query_as::<_, GatewayRow>(
            "SELECT gtw_id, gtw_name, gtw_adapter_id, gtw_params_jsonb, gtw_is_active FROM gateway",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(GatewayRow::into_domain).collect())
    }

    async fn all_channels(&self) -> RepositoryResult<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT chn_id, chn_name, chn_is_active, gtw_id, chn_params_jsonb FROM channel",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(ChannelRow::into_domain).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GatewayRow {
    gtw_id: i32,
    gtw_name: String,
    gtw_adapter_id: String,
    gtw_params_jsonb: Json<serde_json::Value>,
    gtw_is_active: bool,
}

impl GatewayRow {
    fn into_domain(self) -> Gateway {
        Gateway {
            id: self.gtw_id,
            name: self.gtw_name,
            adapter_key: self.gtw_adapter_id,
            params: self.gtw_params_jsonb.0,
            is_active: self.gtw_is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChannelRow {
    chn_id: i32,
    chn_name: String,
    chn_is_active: bool,
    gtw_id: i32,
    chn_params_jsonb: Json<serde_json::Value>,
}

impl ChannelRow {
    fn into_domain(self) -> Channel {
        Channel {
            id: self.chn_id,
            name: self.chn_name,
            gateway_id: self.gtw_id,
            params: self.chn_params_jsonb.0,
            is_active: self.chn_is_active,
        }
    }
}
