//! # Service Configuration
//!
//! Configuration model for the HTTP service. Every field carries a serde
//! default so a partial file (or none at all) still deserializes; `validate`
//! is the single gate that decides whether the result is usable.

use serde::Deserialize;
use shipsync_core::credentials::{CredentialSet, Secret};
use shipsync_core::order::UpsertPolicy;

// ============================================================================
// Configuration
// ============================================================================

/// Service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Courier pull-API settings
    #[serde(default)]
    pub courier: CourierConfig,

    /// Durable payload buffer settings
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Order ledger settings
    #[serde(default)]
    pub orders: OrdersConfig,

    /// Per-trust-domain credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the loaded configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty credential in any trust
    /// domain, the same secret configured for two domains, a filesystem
    /// backend without a path, or a zero `max_attempts`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials.validate()?;

        if self.buffer.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "buffer.max_attempts must be at least 1".to_string(),
            });
        }

        if self.buffer.backend == StorageBackend::Filesystem && self.buffer.path.is_empty() {
            return Err(ConfigError::Invalid {
                message: "buffer.path is required for the filesystem backend".to_string(),
            });
        }

        if self.orders.backend == StorageBackend::Filesystem && self.orders.path.is_empty() {
            return Err(ConfigError::Invalid {
                message: "orders.path is required for the filesystem backend".to_string(),
            });
        }

        if self.courier.base_url.is_empty() {
            return Err(ConfigError::Invalid {
                message: "courier.base_url must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Courier pull-API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Base URL of the courier's tracking API
    pub base_url: String,

    /// API token sent as `Authorization: Token <value>`
    pub api_token: Secret,

    /// Per-call timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://track.delhivery.com".to_string(),
            api_token: Secret::new(""),
            timeout_seconds: 10,
        }
    }
}

/// Storage backend selector for the buffer and order ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    Memory,
    Filesystem,
}

/// Durable payload buffer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Backing store for staged payloads
    pub backend: StorageBackend,

    /// Directory for the filesystem backend
    pub path: String,

    /// Processing attempts before a payload is dropped as poison
    pub max_attempts: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: "./data/payloads".to_string(),
            max_attempts: 3,
        }
    }
}

/// Order ledger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    /// Backing store for the order ledger
    pub backend: StorageBackend,

    /// Directory for the filesystem backend
    pub path: String,

    /// Behavior for events whose waybill matches no order
    pub upsert_policy: UpsertPolicy,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: "./data/orders".to_string(),
            upsert_policy: UpsertPolicy::CreateMissing,
        }
    }
}

/// Per-trust-domain credential configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Courier webhook ingress token
    pub webhook_token: Secret,

    /// Internal worker token
    pub internal_token: Secret,

    /// Cron sweeper / bulk sync token
    pub cron_token: Secret,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            webhook_token: Secret::new(""),
            internal_token: Secret::new(""),
            cron_token: Secret::new(""),
        }
    }
}

impl CredentialsConfig {
    /// Build the runtime credential set
    pub fn credential_set(&self) -> CredentialSet {
        CredentialSet::new(
            self.webhook_token.clone(),
            self.internal_token.clone(),
            self.cron_token.clone(),
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let domains = [
            ("credentials.webhook_token", &self.webhook_token),
            ("credentials.internal_token", &self.internal_token),
            ("credentials.cron_token", &self.cron_token),
        ];

        for (key, secret) in &domains {
            if secret.is_empty() {
                return Err(ConfigError::Missing {
                    key: key.to_string(),
                });
            }
        }

        // Reused secrets would collapse the trust domains into one.
        for (i, (key_a, secret_a)) in domains.iter().enumerate() {
            for (key_b, secret_b) in domains.iter().skip(i + 1) {
                if secret_a.matches(secret_b.expose()) {
                    return Err(ConfigError::Invalid {
                        message: format!("{} and {} must differ", key_a, key_b),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
