// Core pipeline exports
pub mod exporter;
pub mod filters;
pub mod predictor;
pub mod query;
pub mod retry;
pub mod search;

pub use exporter::{encode_row, ExportError, ExportPipeline, ExportTarget};
pub use filters::{matches_filter, within_size_band};
pub use predictor::{PredictionError, PredictionOrchestrator, PredictionOutcome, PredictionSource};
pub use query::{PropertyQuery, QueryError, SchemaName, SqlParam, Statement};
pub use retry::{retry, retry_if, Retried, RetryPolicy};
pub use search::PropertySearch;
