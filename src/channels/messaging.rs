//! WhatsApp Cloud API client.
//!
//! Sends plain text alerts and structured location messages through the
//! Graph API `/{phone_number_id}/messages` endpoint.
//!
//! # API Reference
//!
//! See: <https://developers.facebook.com/docs/whatsapp/cloud-api>
//!
//! # Authentication
//!
//! Requires a phone number id and an API token.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::REQUEST_TIMEOUT;

/// Base URL for the Graph API.
const MESSAGING_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// Client for the WhatsApp messaging API.
#[derive(Clone)]
pub struct MessagingClient {
    client: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    api_token: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct LocationMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    location: LocationBody<'a>,
}

#[derive(Debug, Serialize)]
struct LocationBody<'a> {
    latitude: String,
    longitude: String,
    name: &'a str,
    address: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Strip a destination down to digits only, as the Cloud API requires
/// (no `+`, spaces or separators).
pub fn normalize_destination(to: &str) -> String {
    to.chars().filter(char::is_ascii_digit).collect()
}

impl MessagingClient {
    /// Create a new messaging client.
    pub fn new(phone_number_id: &str, api_token: &str) -> Self {
        Self::with_base_url(MESSAGING_API_BASE, phone_number_id, api_token)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str, phone_number_id: &str, api_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
            api_token: api_token.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout (for testing).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    async fn post_message<T: Serialize>(&self, payload: &T) -> anyhow::Result<String> {
        let response = self
            .client
            .post(self.messages_url())
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(payload)
            .send()
            .await?
            .error_for_status()?;

        let data = response.json::<SendMessageResponse>().await?;
        data.messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| anyhow::anyhow!("no message id in provider response"))
    }

    /// Send a plain text alert, returning the provider's message id.
    pub async fn send_text(&self, to: &str, body: &str) -> anyhow::Result<String> {
        let to = normalize_destination(to);

        self.post_message(&TextMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &to,
            kind: "text",
            text: TextBody {
                preview_url: true,
                body,
            },
        })
        .await
    }

    /// Send a structured location message.
    pub async fn send_location(
        &self,
        to: &str,
        latitude: f64,
        longitude: f64,
        name: &str,
        address: &str,
    ) -> anyhow::Result<String> {
        let to = normalize_destination(to);

        self.post_message(&LocationMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &to,
            kind: "location",
            location: LocationBody {
                latitude: latitude.to_string(),
                longitude: longitude.to_string(),
                name,
                address,
            },
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_keeps_digits_only() {
        assert_eq!(normalize_destination("+591 712-34567"), "59171234567");
        assert_eq!(normalize_destination("59171234567"), "59171234567");
        assert_eq!(normalize_destination("(591) 71 23 45 67"), "59171234567");
    }

    #[test]
    fn messages_url_includes_phone_number_id() {
        let client = MessagingClient::with_base_url("https://graph.test/", "12345", "token");
        assert_eq!(client.messages_url(), "https://graph.test/12345/messages");
    }
}
