#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use crate::adapters::database::DbPool;
use crate::adapters::database::outbox_repo::OutboxRepository;
use crate::adapters::database::push_token_repo::PushTokenRepository;
use crate::adapters::push::PushTransport;
use crate::adapters::push::apns::ApnsClient;
use crate::api::{AppState, MgmtState};
use crate::config::Config;
use crate::services::health_service::HealthService;
use crate::services::notifier::ApnsNotifier;
use crate::services::outbox_queue::OutboxQueue;
use crate::services::outbox_service::OutboxService;
use crate::services::push_service::PushService;
use crate::services::push_token_service::PushTokenService;
use crate::services::store::{DeviceTokenStore, OutboxStore, UnconfiguredStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

/// State for both routers, ready to serve.
#[derive(Debug)]
pub struct App {
    pub state: AppState,
    pub mgmt: MgmtState,
}

/// Wires stores, transport and services; every seam can be replaced before `build`.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    transport: Option<Arc<dyn PushTransport>>,
    token_store: Option<Arc<dyn DeviceTokenStore>>,
    outbox: Option<Arc<dyn OutboxStore>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, transport: None, token_store: None, outbox: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_token_store(mut self, store: Arc<dyn DeviceTokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_outbox_store(mut self, store: Arc<dyn OutboxStore>) -> Self {
        self.outbox = Some(store);
        self
    }

    /// Without a pool, stores that were not overridden fail every call with the missing store settings.
    ///
    /// # Errors
    /// Returns an error if a store URL is configured but no pool was supplied for it,
    /// or the APNs client cannot be built.
    pub fn build(self) -> anyhow::Result<App> {
        let missing_store_config = if self.pool.is_some() { Vec::new() } else { self.config.database.missing() };
        let needs_pool = self.token_store.is_none() || self.outbox.is_none();
        if self.pool.is_none() && missing_store_config.is_empty() && needs_pool {
            anyhow::bail!("database pool is required");
        }
        let unconfigured = UnconfiguredStore::new(missing_store_config.clone());

        let transport: Arc<dyn PushTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ApnsClient::new(&self.config.apns)?),
        };
        let token_store: Arc<dyn DeviceTokenStore> = match (self.token_store, &self.pool) {
            (Some(store), _) => store,
            (None, Some(pool)) => Arc::new(PushTokenService::new(pool.clone(), PushTokenRepository::new())),
            (None, None) => Arc::new(unconfigured.clone()),
        };
        let outbox: Arc<dyn OutboxStore> = match (self.outbox, &self.pool) {
            (Some(store), _) => store,
            (None, Some(pool)) => Arc::new(OutboxQueue::new(pool.clone(), OutboxRepository::new())),
            (None, None) => Arc::new(unconfigured),
        };

        let notifier = Arc::new(ApnsNotifier::new(transport, Arc::clone(&token_store), &self.config.apns));

        let push_service = PushService::new(self.config.apns.clone(), Arc::clone(&notifier), Arc::clone(&token_store));
        let outbox_service =
            OutboxService::new(self.config.outbox.clone(), &self.config.apns, outbox, token_store, notifier);
        let health_service = HealthService::new(self.pool, self.config.database.health_timeout_ms);

        Ok(App {
            state: AppState {
                push_service,
                outbox_service,
                request_timeout: Duration::from_secs(self.config.server.request_timeout_secs),
                missing_store_config,
            },
            mgmt: MgmtState { health_service },
        })
    }
}

/// Flips `shutdown_tx` on Ctrl-C or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    let _ = signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through `tracing` so they reach the configured log sink.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());

        tracing::error!(panic.location = %location, panic.message = %message, "Process panicked");
    }));
}
