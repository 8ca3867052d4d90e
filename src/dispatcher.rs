use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;

use crate::error::HippoError;

// Upper bound for one delivery attempt
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

// Posts payloads to one incoming webhook, no retries
#[derive(Debug, Clone)]
pub struct Dispatcher {
    url: String,
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    // own client with the default timeout
    pub fn for_url(url: impl Into<String>) -> Result<Self, HippoError> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;
        Ok(Self::new(url, client))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn send(&self, payload: &Value) -> Result<(), HippoError> {
        let body = serde_json::to_vec(payload)?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HippoError::Delivery(status));
        }

        Ok(())
    }
}
