use crate::config::ExplanationConfig;
use crate::error::AppError;
use std::time::Duration;
use tracing::warn;

#[derive(serde::Serialize)]
struct ExplanationRequest<'a> {
    category: &'a str,
}

#[derive(serde::Deserialize)]
struct ExplanationResponse {
    explanation: Option<String>,
}

/// Optional remote explanation endpoint. Disabled unless both `enabled` and
/// `endpoint` are configured; any failure yields `None`.
#[derive(Clone)]
pub struct ExplanationClient {
    client: reqwest::Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl ExplanationClient {
    pub fn new(config: &ExplanationConfig) -> Self {
        let endpoint = if config.enabled {
            config.endpoint.clone()
        } else {
            None
        };

        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub async fn fetch(&self, category_id: &str) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?;

        match self.request(endpoint, category_id).await {
            Ok(explanation) => explanation,
            Err(e) => {
                warn!("Explanation request for '{}' failed: {}", category_id, e);
                None
            }
        }
    }

    async fn request(&self, endpoint: &str, category_id: &str) -> Result<Option<String>, AppError> {
        let response = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .json(&ExplanationRequest {
                category: category_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("Explanation API returned HTTP {}", response.status()).into());
        }

        let body: ExplanationResponse = response.json().await?;
        Ok(body.explanation)
    }
}
