//! Property core - data access, prediction caching and export for the property listing service
//!
//! This library provides the resilient pieces behind the listing service:
//! retried database access with parameter-bound queries, a fingerprint-keyed
//! prediction cache in front of the inference service, and a paged export
//! pipeline that publishes a delimited file to object storage.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::config::Settings;
pub use crate::core::{
    ExportPipeline, ExportTarget, PredictionOrchestrator, PredictionOutcome, PropertySearch, RetryPolicy,
};
pub use crate::models::{PredictedProperty, PredictionRequest, PropertyPage, PropertyRecord, SearchFilter, SearchRequest};
pub use crate::services::{ConnectionManager, PredictionCache, PropertyRepository, S3Store};
