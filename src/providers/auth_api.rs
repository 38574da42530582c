use crate::core::auth::{AuthError, CredentialValidator, Credentials};
use crate::core::session::SessionToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Exchanges credentials for a session token against the dashboard's
/// login endpoint.
pub struct HttpCredentialValidator {
    base_url: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

impl HttpCredentialValidator {
    pub fn new(base_url: &str) -> Self {
        HttpCredentialValidator {
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl CredentialValidator for HttpCredentialValidator {
    #[instrument(name = "AuthLogin", skip(self, credentials))]
    async fn validate(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        let url = format!("{}/auth/login", self.base_url);
        debug!("Submitting credentials to {}", url);

        let client = reqwest::Client::builder()
            .user_agent("cryptodash/0.2")
            .build()?;
        let response = client
            .post(&url)
            .json(&LoginRequest {
                email: credentials.identifier(),
                password: credentials.secret(),
            })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable {
                status: status.as_u16(),
            });
        }

        let body: LoginResponse = response.json().await?;
        debug!("Credentials accepted");
        Ok(SessionToken::new(body.access_token))
    }
}
