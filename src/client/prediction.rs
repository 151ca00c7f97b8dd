/// Prediction backend REST client
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use super::PredictionSource;
use crate::error::{MonitorError, Result};
use crate::types::{Config, PredictionRequest, PredictionResponse};

/// Longest body excerpt kept in status errors
const ERROR_BODY_LIMIT: usize = 512;

pub struct PredictionClient {
    client: Client,
    endpoint: String,
}

impl PredictionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(PredictionClient {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.request_timeout_sec),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the request and decode the backend's answer
    pub async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        debug!("Requesting prediction for {} from {}", request.symbol, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MonitorError::NetworkTimeout(format!("{}: {}", self.endpoint, e))
                } else {
                    MonitorError::HttpError(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        let decoded = decode_response(status, &body)?;
        info!(
            "Prediction for {} received: {} intervals",
            request.symbol,
            decoded.intervals.len()
        );
        Ok(decoded)
    }
}

impl PredictionSource for PredictionClient {
    fn fetch<'a>(&'a self, request: &'a PredictionRequest) -> BoxFuture<'a, Result<PredictionResponse>> {
        self.predict(request).boxed()
    }
}

/// Non-2xx is a transport failure; a body that isn't the response shape is a decode failure
pub fn decode_response(status: StatusCode, body: &str) -> Result<PredictionResponse> {
    if !status.is_success() {
        let mut excerpt = body.trim().to_string();
        if excerpt.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !excerpt.is_char_boundary(cut) {
                cut -= 1;
            }
            excerpt.truncate(cut);
        }
        return Err(MonitorError::HttpStatus {
            status: status.as_u16(),
            body: excerpt,
        });
    }

    Ok(serde_json::from_str(body)?)
}
