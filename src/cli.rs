use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::sync::Arc;

use crate::acquirer::AcquirerRegistry;
use crate::adapters::{PostgresRouteRepository, PostgresTransactionRepository};
use crate::config::Config;
use crate::services::{PaymentService, RouteCache};

#[derive(Parser)]
#[command(name = "acquiring-core")]
#[command(about = "Acquiring Core - payment acquirer routing and lifecycle service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Poll the provider once for a pending transaction
    Finalize {
        /// Transaction id
        #[arg(value_name = "TXN_ID")]
        txn_id: i64,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

/// Wires the Postgres repositories, the route cache and the acquirer
/// registry into a payment service.
pub async fn build_payment_service(config: &Config, pool: PgPool) -> anyhow::Result<PaymentService> {
    let routes = RouteCache::load(&PostgresRouteRepository::new(pool.clone())).await?;
    let registry = AcquirerRegistry::new(config.callback_base_url.clone(), config.provider_timeout);

    Ok(PaymentService::new(
        Arc::new(PostgresTransactionRepository::new(pool)),
        Arc::new(routes),
        Arc::new(registry),
    ))
}

pub async fn handle_tx_finalize(config: &Config, txn_id: i64) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    let service = build_payment_service(config, pool).await?;

    let txn = service.finalize(txn_id).await?;
    tracing::info!(txn_id, status = %txn.status, "Transaction finalized");
    println!("✓ Transaction {} is now {}", txn.txn_id, txn.status);
    if let Some(error) = &txn.error {
        println!("  Error {}: {}", error.code, error.description);
    }

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", config.masked_database_url());
    println!("  Callback Base URL: {}", config.callback_base_url);
    println!(
        "  Provider Timeout: {}s",
        config.provider_timeout.as_secs()
    );
    let sources = &config.callback_sources;
    println!("  Callback Allowed IPs: {}", sources.default);
    for provider in crate::services::callback::callback_providers() {
        if let Some(networks) = sources.providers.get(provider) {
            println!("    {}: {}", provider, networks);
        }
    }
    println!("  Trusted Proxy Depth: {}", sources.trusted_proxy_depth);
    println!("  Log Format: {:?}", config.log_format);
    println!(
        "  Supported Acquirers: {}",
        AcquirerRegistry::supported_keys().join(", ")
    );

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}
