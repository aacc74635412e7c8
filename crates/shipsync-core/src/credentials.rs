//! # Trust-Domain Credentials
//!
//! Three bearer-style secrets guard the three entry points of the pipeline,
//! and they are never interchangeable: the courier's webhook credential, the
//! internal worker credential, and the cron credential each authorize only
//! their own trust domain.
//!
//! Secrets are wiped from memory on drop and compared in constant time.

use serde::Deserialize;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Types
// ============================================================================

/// The trust domain a presented credential claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustDomain {
    /// Public courier-facing webhook ingress
    CourierWebhook,
    /// Internal-only async worker endpoint
    InternalWorker,
    /// Scheduled sweeper / bulk sync triggers
    CronSweeper,
}

impl TrustDomain {
    /// Get string representation for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CourierWebhook => "courier-webhook",
            Self::InternalWorker => "internal-worker",
            Self::CronSweeper => "cron-sweeper",
        }
    }
}

impl fmt::Display for TrustDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bearer secret with zeroize-on-drop semantics and redacted Debug
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Whether the secret is empty (unconfigured)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Expose the raw bytes for comparison or outbound auth headers
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time equality against a presented token
    pub fn matches(&self, presented: &str) -> bool {
        // ct_eq on unequal lengths short-circuits inside subtle without
        // leaking content.
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"<REDACTED>").finish()
    }
}

/// The full credential set, one secret per trust domain
#[derive(Debug, Clone)]
pub struct CredentialSet {
    webhook: Secret,
    internal: Secret,
    cron: Secret,
}

impl CredentialSet {
    /// Assemble the per-domain secrets
    pub fn new(webhook: Secret, internal: Secret, cron: Secret) -> Self {
        Self {
            webhook,
            internal,
            cron,
        }
    }

    /// Verify a presented token against exactly one trust domain.
    ///
    /// A token valid for one domain never authorizes another, even if an
    /// operator misconfigures two domains with the same value.
    pub fn verify(&self, domain: TrustDomain, presented: &str) -> bool {
        let expected = match domain {
            TrustDomain::CourierWebhook => &self.webhook,
            TrustDomain::InternalWorker => &self.internal,
            TrustDomain::CronSweeper => &self.cron,
        };

        // An unconfigured secret fails closed.
        !expected.is_empty() && expected.matches(presented)
    }

    /// The internal worker secret, for outbound self-dispatch auth
    pub fn internal_token(&self) -> &Secret {
        &self.internal
    }
}

/// Strip the `Bearer ` scheme from an `authorization` header value.
///
/// Returns `None` when the scheme is absent; the caller fails closed.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
