//! # Shipsync Service
//!
//! Binary entry point for the order-status synchronization service.
//!
//! This executable:
//! - Loads layered configuration from files and environment
//! - Initializes structured logging
//! - Wires the configured storage adapters and the courier client
//! - Starts the HTTP server from shipsync-api

use shipsync_api::config::{ServiceConfig, StorageBackend};
use shipsync_api::errors::ServiceError;
use shipsync_api::{start_server, AppState};
use shipsync_core::adapters::{
    FilesystemOrderStore, FilesystemPayloadBuffer, InMemoryOrderStore, InMemoryPayloadBuffer,
};
use shipsync_core::buffer::PayloadBuffer;
use shipsync_core::bulk_sync::BulkSyncJob;
use shipsync_core::courier::client::HttpCourierClient;
use shipsync_core::order::OrderStore;
use shipsync_core::reconciler::Reconciler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. /etc/shipsync/service.yaml             — system-wide defaults
    //  2. ./config/service.yaml                  — deployment-local override
    //  3. Path given by SHIPSYNC_CONFIG_FILE env — operator-specified file
    //  4. Environment variables prefixed SHIPSYNC__ (double-underscore
    //     separator), e.g. SHIPSYNC__SERVER__PORT=9090 sets server.port
    //
    // All fields carry serde defaults, so absent files produce a valid config;
    // credentials still have to come from somewhere, which validate() enforces.
    //
    // Configuration is loaded before logging is initialized so the logging
    // settings themselves are configurable; load failures go to stderr.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/shipsync/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    let explicit_path = std::env::var("SHIPSYNC_CONFIG_FILE")
        .ok()
        .filter(|p| !p.is_empty());
    if let Some(path) = &explicit_path {
        config_builder = config_builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("SHIPSYNC").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to build configuration: {}; aborting", e);
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            eprintln!(
                "Could not deserialize service configuration: {}; aborting. \
                 Fix the configuration and restart.",
                e
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        eprintln!("Service configuration is invalid: {}; aborting", e);
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Initialize logging
    //
    // The configured level seeds the filter for the shipsync crates; RUST_LOG
    // still overrides everything when set.
    // -------------------------------------------------------------------------
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &service_config.logging.level;
        tracing_subscriber::EnvFilter::new(format!(
            "shipsync_service={0},shipsync_api={0},shipsync_core={0},tower_http=debug",
            level
        ))
    });

    if service_config.logging.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Shipsync Service");
    if let Some(path) = &explicit_path {
        info!(path = %path, "Loaded configuration from explicit path");
    }

    // -------------------------------------------------------------------------
    // Wire adapters and collaborators
    // -------------------------------------------------------------------------
    let buffer: Arc<dyn PayloadBuffer> = match service_config.buffer.backend {
        StorageBackend::Memory => Arc::new(InMemoryPayloadBuffer::new()),
        StorageBackend::Filesystem => {
            let path = PathBuf::from(&service_config.buffer.path);
            match FilesystemPayloadBuffer::new(path.clone()).await {
                Ok(b) => {
                    info!(path = %path.display(), "Using filesystem payload buffer");
                    Arc::new(b)
                }
                Err(e) => {
                    error!(error = %e, "Failed to open payload buffer; aborting");
                    std::process::exit(3);
                }
            }
        }
    };

    let store: Arc<dyn OrderStore> = match service_config.orders.backend {
        StorageBackend::Memory => Arc::new(InMemoryOrderStore::new()),
        StorageBackend::Filesystem => {
            let path = PathBuf::from(&service_config.orders.path);
            match FilesystemOrderStore::open(path.clone()).await {
                Ok(s) => {
                    info!(path = %path.display(), "Using filesystem order store");
                    Arc::new(s)
                }
                Err(e) => {
                    error!(error = %e, "Failed to open order store; aborting");
                    std::process::exit(3);
                }
            }
        }
    };

    let courier = match HttpCourierClient::with_timeout(
        service_config.courier.base_url.clone(),
        service_config.courier.api_token.clone(),
        Duration::from_secs(service_config.courier.timeout_seconds),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to construct courier client; aborting");
            std::process::exit(3);
        }
    };

    let reconciler = Arc::new(Reconciler::new(
        store,
        service_config.orders.upsert_policy,
    ));
    let bulk_sync = Arc::new(BulkSyncJob::new(courier, Arc::clone(&reconciler)));
    let credentials = Arc::new(service_config.credentials.credential_set());

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        upsert_policy = ?service_config.orders.upsert_policy,
        "Starting HTTP server"
    );

    let state = AppState::new(
        Arc::new(service_config),
        buffer,
        reconciler,
        bulk_sync,
        credentials,
    );

    // Start the server
    if let Err(e) = start_server(state).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
