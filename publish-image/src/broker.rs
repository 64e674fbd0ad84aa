mod aws;
mod oidc;

use std::fmt;

pub use aws::*;
use time::OffsetDateTime;

use crate::error::AuthError;

/// A short-lived registry credential. Lives for at most one pipeline run and is never persisted
/// outside the run's private docker configuration.
#[derive(Clone)]
pub struct CredentialLease {
    username: String,
    access_token: String,
    expiry: OffsetDateTime,
    scope: String,
}

impl CredentialLease {
    pub fn new(
        username: impl Into<String>,
        access_token: impl Into<String>,
        expiry: OffsetDateTime,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            access_token: access_token.into(),
            expiry,
            scope: scope.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expiry(&self) -> OffsetDateTime {
        self.expiry
    }

    /// The registry host the credential was issued for.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expiry
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    pub fn require_valid(&self) -> Result<(), AuthError> {
        if self.is_expired() {
            return Err(AuthError::Expired {
                scope: self.scope.clone(),
                expiry: self.expiry,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialLease")
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

/// The federated identity to request a lease for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub role: String,
    pub region: String,
}

pub trait CredentialBroker {
    /// Exchanges a federated identity for a registry credential. Must complete before any build or
    /// push starts.
    fn acquire(&self, identity: &Identity) -> Result<CredentialLease, AuthError>;
}
