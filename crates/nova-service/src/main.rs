use clap::{Parser, ValueEnum};
use nova_service::{build_router, ConsentStorageConfig, NovaEngine, ServiceConfig};
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConsentStorageMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "novad", version, about = "Credit Intelligence Engine REST service")]
struct Cli {
    /// REST socket address to bind, e.g. 127.0.0.1:8092
    #[arg(long, default_value = "127.0.0.1:8092")]
    listen: SocketAddr,
    /// Consent persistence backend. `auto` picks postgres when a database url is configured.
    #[arg(long, value_enum, default_value_t = ConsentStorageMode::Auto, env = "NOVA_CONSENT_STORAGE")]
    consent_storage: ConsentStorageMode,
    /// PostgreSQL url for consent artefact persistence.
    #[arg(long, env = "NOVA_CONSENT_DATABASE_URL")]
    consent_database_url: Option<String>,
    /// Max PostgreSQL pool connections for consent persistence.
    #[arg(long, default_value_t = 5, env = "NOVA_CONSENT_PG_MAX_CONNECTIONS")]
    consent_pg_max_connections: u32,
    /// Disables every degraded-mode fallback (dev-mode sentinel keys, synthesised
    /// AA sessions, HMAC JWS fallback).
    #[arg(long, env = "NOVA_PRODUCTION", default_value_t = false)]
    production: bool,
}

fn resolve_consent_storage(cli: &Cli) -> anyhow::Result<ConsentStorageConfig> {
    let resolved_url = cli
        .consent_database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.consent_storage {
        ConsentStorageMode::Memory => ConsentStorageConfig::Memory,
        ConsentStorageMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!("consent_storage=postgres requires --consent-database-url or DATABASE_URL")
            })?;
            ConsentStorageConfig::Postgres { database_url, max_connections: cli.consent_pg_max_connections }
        }
        ConsentStorageMode::Auto => match resolved_url {
            Some(database_url) => {
                ConsentStorageConfig::Postgres { database_url, max_connections: cli.consent_pg_max_connections }
            }
            None => ConsentStorageConfig::Memory,
        },
    };

    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "nova_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let consent_storage = resolve_consent_storage(&cli)?;

    let mut core = nova_core::CoreConfig::default();
    core.production = cli.production;

    let engine = NovaEngine::bootstrap(ServiceConfig { core, consent_storage }).await?;
    let app = build_router(engine);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("nova-service REST listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
