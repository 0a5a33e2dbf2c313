//! Login against the external credential endpoint, and the locally stored user.
//!
//! No credential handling happens here beyond forwarding `{name, password}`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::user::User;

pub mod handlers;
pub mod user_context;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter both username and password.")]
    MissingCredentials,

    #[error("{0}")]
    Rejected(String),

    #[error("Network error or server is unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to store user: {0}")]
    Store(#[from] std::io::Error),

    #[error("Failed to encode user: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    name: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: Option<User>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct LoginClient {
    client: Client,
    url: String,
}

impl LoginClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, AuthError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url,
        })
    }

    pub async fn login(&self, name: &str, password: &str) -> Result<User, AuthError> {
        if name.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let response = self
            .client
            .post(&self.url)
            .json(&LoginRequest { name, password })
            .send()
            .await?;

        let status = response.status();
        let body: LoginResponse = response.json().await?;

        match body {
            LoginResponse {
                user: Some(user), ..
            } if status.is_success() => {
                info!(user = %user.name, "Login successful");
                Ok(user)
            }
            LoginResponse { error, .. } => Err(AuthError::Rejected(
                error.unwrap_or_else(|| "Login failed. Please try again.".to_string()),
            )),
        }
    }
}
