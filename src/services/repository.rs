use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::core::query::{PropertyQuery, SchemaName, Statement};
use crate::models::{Pagination, PropertyRecord, SearchFilter};
use crate::services::postgres::{DbError, FetchMode};

/// Errors surfaced by the typed repository methods
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database unavailable: {0}")]
    Unavailable(#[from] DbError),
}

/// Source of property rows
///
/// `Ok(None)` means the statement ran and produced nothing; errors are
/// infrastructure failures that survived the source's own retries.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_properties(
        &self,
        stmt: &Statement,
        mode: FetchMode,
    ) -> Result<Option<Vec<PropertyRecord>>, DbError>;

    async fn fetch_count(&self, stmt: &Statement) -> Result<Option<i64>, DbError>;
}

/// Typed queries against the joined property view
///
/// Holds no state between calls beyond the shared row source.
pub struct PropertyRepository<S: RowSource> {
    source: Arc<S>,
    query: PropertyQuery,
}

impl<S: RowSource> Clone for PropertyRepository<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            query: self.query.clone(),
        }
    }
}

impl<S: RowSource> PropertyRepository<S> {
    pub fn new(source: Arc<S>, schema: SchemaName) -> Self {
        Self {
            source,
            query: PropertyQuery::new(schema),
        }
    }

    pub async fn try_select_by_id(&self, id: i64) -> Result<Option<PropertyRecord>, RepositoryError> {
        let stmt = self.query.select_by_id(id);
        let rows = self.source.fetch_properties(&stmt, FetchMode::One).await?;
        Ok(rows.and_then(|rows| rows.into_iter().next()))
    }

    /// Number of properties visible through the join, never negative
    pub async fn try_count_select_all(&self, active_only: bool) -> Result<i64, RepositoryError> {
        let stmt = self.query.count(active_only);
        let count = self.source.fetch_count(&stmt).await?;
        Ok(count.unwrap_or(0).max(0))
    }

    pub async fn try_select_all(
        &self,
        filter: &SearchFilter,
        page: Pagination,
    ) -> Result<Vec<PropertyRecord>, RepositoryError> {
        let stmt = self.query.select_all(filter, page);
        let rows = self.source.fetch_properties(&stmt, FetchMode::All).await?;
        Ok(rows.unwrap_or_default())
    }

    /// Look up one property; failures are logged and reported as absence
    pub async fn select_by_id(&self, id: i64) -> Option<PropertyRecord> {
        match self.try_select_by_id(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Error: {}. property_id: {}", e, id);
                None
            }
        }
    }

    /// Count properties; failures are logged and reported as zero
    pub async fn count_select_all(&self, active_only: bool) -> i64 {
        self.try_count_select_all(active_only).await.unwrap_or_else(|e| {
            tracing::error!("Error counting properties: {}", e);
            0
        })
    }

    /// List properties; failures are logged and reported as an empty list
    pub async fn select_all(&self, filter: &SearchFilter, page: Pagination) -> Vec<PropertyRecord> {
        self.try_select_all(filter, page).await.unwrap_or_else(|e| {
            tracing::error!("Error listing properties: {}", e);
            Vec::new()
        })
    }
}
