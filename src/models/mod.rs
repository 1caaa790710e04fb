// Model exports
pub mod domain;
pub mod requests;

pub use domain::{Address, ExportRow, PredictedProperty, PropertyFeatures, PropertyPage, PropertyRecord};
pub use requests::{Pagination, PredictionRequest, SearchFilter, SearchRequest, SIZE_BAND};
