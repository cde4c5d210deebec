//! HTTP client for the predictor's `/predict` endpoint

use anyhow::{Context, Result};
use meter_lib::{IngestRequest, PredictResponse};
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub struct PredictClient {
    client: Client,
    url: Url,
}

impl PredictClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let url = Url::parse(url).context("Invalid predictor URL")?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// POST one sample and decode the predictor's answer
    pub async fn post(&self, sample: &IngestRequest) -> Result<PredictResponse> {
        let response = self
            .client
            .post(self.url.clone())
            .json(sample)
            .send()
            .await
            .context("Failed to send sample")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Predictor error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse predictor response")
    }
}
