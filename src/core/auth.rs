//! Credential validation abstractions

use crate::core::session::SessionToken;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Rejected before any network call is made.
#[derive(Debug, Error, PartialEq)]
pub enum CredentialError {
    #[error("identifier is required")]
    MissingIdentifier,
    #[error("identifier must be an email address")]
    MalformedIdentifier,
    #[error("secret must be at least {min} characters")]
    SecretTooShort { min: usize },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential validator returned HTTP {status}")]
    Unavailable { status: u16 },
    #[error("credential validator unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
}

/// A validated identifier/secret pair. Construction enforces the form rules,
/// so a `Credentials` value is always submittable.
#[derive(Clone)]
pub struct Credentials {
    identifier: String,
    secret: String,
}

impl Credentials {
    pub const MIN_SECRET_LEN: usize = 6;

    pub fn new(identifier: &str, secret: &str) -> Result<Self, CredentialError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(CredentialError::MissingIdentifier);
        }
        match identifier.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(CredentialError::MalformedIdentifier),
        }
        if secret.chars().count() < Self::MIN_SECRET_LEN {
            return Err(CredentialError::SecretTooShort {
                min: Self::MIN_SECRET_LEN,
            });
        }

        Ok(Self {
            identifier: identifier.to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Only the validator call should read this.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, credentials: &Credentials) -> Result<SessionToken, AuthError>;
}
