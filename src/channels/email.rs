//! Transactional email API client.
//!
//! Speaks a Resend-style JSON API: POST `{base}/emails` with sender,
//! recipient, subject and HTML body, returning a delivery id.
//!
//! # Authentication
//!
//! Requires an API token, passed as a bearer credential.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::REQUEST_TIMEOUT;

/// Base URL for the email API.
const EMAIL_API_BASE: &str = "https://api.resend.com";

/// Client for the email delivery API.
#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    from: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl EmailClient {
    /// Create a new email client.
    ///
    /// # Arguments
    ///
    /// * `api_token` - Provider API token.
    /// * `from` - Sender address, e.g. `"Pettag <alerts@pettag.example>"`.
    pub fn new(api_token: &str, from: &str) -> Self {
        Self::with_base_url(EMAIL_API_BASE, api_token, from)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str, api_token: &str, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            from: from.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout (for testing).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one HTML email, returning the provider's delivery id.
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<String> {
        let url = format!("{}/emails", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&SendEmailRequest {
                from: &self.from,
                to,
                subject,
                html,
            })
            .send()
            .await?
            .error_for_status()?;

        let data = response.json::<SendEmailResponse>().await?;
        Ok(data.id)
    }
}
