//! Pulls photos that the capture web page uploaded to the relay.

use crate::config::Config;
use crate::utils::logging::log_retry;
use anyhow::{anyhow, Result};
use backon::{ExponentialBuilder, Retryable};
use serde::Deserialize;
use std::time::Duration;

/// Payload the capture page sends back through `Telegram.WebApp.sendData`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl WebAppPayload {
    /// Relay token of an uploaded photo, if that's what the payload is.
    pub fn photo_token(raw: &str) -> Option<String> {
        let payload: WebAppPayload = serde_json::from_str(raw).ok()?;
        if payload.kind != "photo_uploaded" {
            return None;
        }
        payload.token.filter(|t| !t.trim().is_empty())
    }
}

#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    config: Config,
}

impl RelayClient {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, config })
    }

    pub async fn pull(&self, token: &str) -> Result<Vec<u8>> {
        let url = self.config.pull_url(token)?;

        let bytes = (|| async {
            let response = self.http.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("relay returned {}", status.as_u16()));
            }
            Ok(response.bytes().await?.to_vec())
        })
        .retry(ExponentialBuilder::default().with_max_times(2))
        .notify(|e: &anyhow::Error, delay: Duration| log_retry("relay_pull", &e.to_string(), delay.as_millis()))
        .await?;

        if bytes.is_empty() {
            return Err(anyhow!("relay returned an empty photo"));
        }
        if bytes.len() > self.config.max_photo_size {
            return Err(anyhow!("photo is larger than {} bytes", self.config.max_photo_size));
        }
        Ok(bytes)
    }
}
