use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::ServiceSettings;
use crate::models::{PredictedProperty, PropertyFeatures};

/// Errors that can occur when calling the inference service
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Prediction rejected: {status} - {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Price model client. Calls are never retried.
pub struct InferenceClient {
    base_url: String,
    client: Client,
}

impl InferenceClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self, InferenceError> {
        let client = Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Request a price prediction, optionally from a specific model
    pub async fn predict_price(
        &self,
        features: &PropertyFeatures,
        model_id: Option<i64>,
    ) -> Result<PredictedProperty, InferenceError> {
        let url = format!("{}/models/predict/price", self.base_url);

        let mut request = self.client.post(&url).json(features);
        if let Some(model_id) = model_id {
            request = request.query(&[("model_id", model_id)]);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Error predict_price: request to {} failed: {}", url, e);
            e
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("Error predict_price: {} - Response: {}", status, body);
            return Err(InferenceError::Rejected { status, body });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Error predict_price: {} - Response: {}", e, body);
            InferenceError::InvalidResponse(format!("Failed to parse prediction: {}", e))
        })
    }
}
