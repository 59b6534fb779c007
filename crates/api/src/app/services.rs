//! Service wiring: pick store and log queue backends from configuration.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use usergate_auth::{BcryptHasher, Hs256TokenService, PasswordHasher, TokenService};
use usergate_events::{InMemoryEventBus, LogEvent};
use usergate_infra::event_bus::RedisStreamsPublisher;
use usergate_infra::{
    AppConfig, AuthFlow, InMemoryUserStore, LogForwarder, PostgresUserStore, UserDirectory,
    UserStore,
};

/// Shared, read-only service handles used by every request.
#[derive(Clone, Debug)]
pub struct AppServices {
    pub directory: Arc<UserDirectory>,
    pub auth: Arc<AuthFlow>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn UserStore>,
        logs: LogForwarder,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        let hasher: Arc<dyn PasswordHasher> =
            Arc::new(BcryptHasher::new(config.bcrypt_cost).context("invalid BCRYPT_COST")?);
        let tokens: Arc<dyn TokenService> =
            Arc::new(Hs256TokenService::new(&config.jwt_secret, config.token_ttl));

        let directory = Arc::new(
            UserDirectory::new(store, Arc::clone(&hasher), logs.clone())
                .with_max_page_size(config.max_page_size),
        );
        let auth = Arc::new(AuthFlow::new(Arc::clone(&directory), hasher, tokens, logs));

        Ok(Self { directory, auth })
    }
}

/// Build services from configuration.
///
/// - `DATABASE_URL` set: Postgres store, otherwise in-memory.
/// - `REDIS_URL` set: Redis Streams log queue, otherwise an in-process bus
///   with no consumers.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .context("failed to connect to Postgres")?;
            tracing::info!(max_connections = config.database_max_connections, "using Postgres user store");
            Arc::new(PostgresUserStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let logs = match &config.redis_url {
        Some(url) => {
            let publisher = RedisStreamsPublisher::new(url, Some(config.log_queue.clone()))
                .context("invalid REDIS_URL")?;
            tracing::info!(stream_key = %config.log_queue, "forwarding log events to Redis");
            LogForwarder::new(publisher).context("failed to start log forwarder")?
        }
        None => {
            tracing::info!("REDIS_URL not set; log events stay in process");
            LogForwarder::new(InMemoryEventBus::<LogEvent>::new())
                .context("failed to start log forwarder")?
        }
    };

    AppServices::new(store, logs, config)
}
