use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::models::{Address, PredictedProperty, PredictionRequest, PropertyFeatures};
use crate::services::address::AddressResolver;
use crate::services::cache::{Fingerprint, PredictionCache};
use crate::services::inference::{InferenceClient, InferenceError};

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Invalid prediction request: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("Inference failed: {0}")]
    Upstream(#[from] InferenceError),

    #[error("Prediction did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionSource {
    Cached,
    Inferred,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Found {
        prediction: PredictedProperty,
        source: PredictionSource,
    },
    /// The zip code could not be resolved to an address
    NotFound,
}

impl PredictionOutcome {
    pub fn prediction(&self) -> Option<&PredictedProperty> {
        match self {
            PredictionOutcome::Found { prediction, .. } => Some(prediction),
            PredictionOutcome::NotFound => None,
        }
    }
}

/// Price prediction pipeline
///
/// # Pipeline Stages
/// 1. Resolve the zip code to an address
/// 2. Check the cache under the request fingerprint
/// 3. Call the inference service on a miss
/// 4. Write the fresh prediction back (best effort)
pub struct PredictionOrchestrator {
    resolver: AddressResolver,
    cache: PredictionCache,
    inference: InferenceClient,
    deadline: Duration,
}

impl PredictionOrchestrator {
    pub fn new(
        resolver: AddressResolver,
        cache: PredictionCache,
        inference: InferenceClient,
        deadline: Duration,
    ) -> Self {
        Self {
            resolver,
            cache,
            inference,
            deadline,
        }
    }

    /// Predict a price, bounded by the orchestrator's deadline
    pub async fn predict(
        &self,
        request: &PredictionRequest,
        model_id: Option<i64>,
    ) -> Result<PredictionOutcome, PredictionError> {
        request.validate()?;

        tokio::time::timeout(self.deadline, self.run(request, model_id))
            .await
            .map_err(|_| {
                tracing::error!("Prediction for {} exceeded {:?}", request.zip_code, self.deadline);
                PredictionError::DeadlineExceeded(self.deadline)
            })?
    }

    async fn run(
        &self,
        request: &PredictionRequest,
        model_id: Option<i64>,
    ) -> Result<PredictionOutcome, PredictionError> {
        let Some(address) = self.resolver.resolve(&request.zip_code).await else {
            tracing::info!("Address not found - Zip Code: {}", request.zip_code);
            return Ok(PredictionOutcome::NotFound);
        };

        let fingerprint = Fingerprint::new(request, &address);
        if let Some(prediction) = self.cache.get(&fingerprint).await {
            tracing::debug!("Cache hit: {}", fingerprint);
            return Ok(PredictionOutcome::Found {
                prediction,
                source: PredictionSource::Cached,
            });
        }

        let features = features(request, &address);
        let prediction = self.inference.predict_price(&features, model_id).await?;

        if !self.cache.put(&fingerprint, &prediction).await {
            tracing::warn!("Prediction for {} was not cached", fingerprint);
        }

        Ok(PredictionOutcome::Found {
            prediction,
            source: PredictionSource::Inferred,
        })
    }
}

fn features(request: &PredictionRequest, address: &Address) -> PropertyFeatures {
    PropertyFeatures {
        rooms: request.rooms,
        bathrooms: request.bathrooms,
        parking_space: request.parking_space,
        size: request.size,
        neighborhood_name: address.neighborhood_name.clone(),
        flood_quota: address.flood_quota,
    }
}
