use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Connection, PgConnection, Postgres, Row};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::DatabaseSettings;
use crate::core::query::{SqlParam, Statement};
use crate::core::retry::{retry_if, Retried, RetryPolicy};
use crate::models::PropertyRecord;
use crate::services::repository::RowSource;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Statement timed out after {0:?}")]
    QueryTimeout(Duration),

    #[error("Invalid connection settings: {0}")]
    InvalidSettings(String),

    #[error("SQLx error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error("No session established")]
    NotConnected,

    #[error("Gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<DbError>,
    },
}

impl DbError {
    /// Whether another attempt could succeed
    ///
    /// SQLSTATE class 42 (syntax error or undefined object) is a problem with
    /// the statement itself and is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Query(sqlx::Error::Database(db)) => {
                !db.code().is_some_and(|code| code.starts_with("42"))
            }
            DbError::InvalidSettings(_) | DbError::Decode(_) => false,
            _ => true,
        }
    }
}

/// How many rows a fetch should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    One,
    All,
}

/// Owner of the single database session
///
/// The session is opened lazily on first use and dropped whenever it fails at
/// the connection level, so the next call reconnects. Access is serialized
/// through an async mutex; callers needing parallelism should hold one
/// manager per worker.
pub struct ConnectionManager {
    options: PgConnectOptions,
    connect_timeout: Duration,
    query_timeout: Duration,
    retry: RetryPolicy,
    session: Mutex<Option<PgConnection>>,
}

impl ConnectionManager {
    /// Build a manager without touching the network
    pub fn connect_lazy(settings: &DatabaseSettings, retry: RetryPolicy) -> Result<Self, DbError> {
        let options: PgConnectOptions = settings
            .url
            .parse()
            .map_err(|e: sqlx::Error| DbError::InvalidSettings(e.to_string()))?;

        Ok(Self {
            options,
            connect_timeout: settings.connect_timeout(),
            query_timeout: settings.query_timeout(),
            retry,
            session: Mutex::new(None),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn open(&self) -> Result<PgConnection, DbError> {
        tracing::debug!(
            "Opening PostgreSQL session to {}:{}",
            self.options.get_host(),
            self.options.get_port()
        );

        let conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| DbError::ConnectTimeout(self.connect_timeout))?
            .map_err(DbError::Connection)?;

        tracing::info!("PostgreSQL session established");
        Ok(conn)
    }

    /// Run a statement once, opening a session first if none is live
    pub async fn execute(&self, stmt: &Statement) -> Result<Vec<PgRow>, DbError> {
        self.run(stmt, FetchMode::All).await
    }

    /// Live session, opening one first if needed
    async fn ensure_open<'a>(
        &self,
        session: &'a mut Option<PgConnection>,
    ) -> Result<&'a mut PgConnection, DbError> {
        if session.is_none() {
            *session = Some(self.open().await?);
        }
        session.as_mut().ok_or(DbError::NotConnected)
    }

    /// Map a bounded statement result, dropping the session when it can no longer be trusted
    fn settle<T>(
        &self,
        session: &mut Option<PgConnection>,
        result: Result<Result<T, sqlx::Error>, tokio::time::error::Elapsed>,
    ) -> Result<T, DbError> {
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                // A database error leaves the session usable; anything else
                // (I/O, TLS, protocol) means it is gone.
                if !matches!(e, sqlx::Error::Database(_)) {
                    tracing::warn!("Dropping PostgreSQL session after error: {}", e);
                    *session = None;
                }
                Err(DbError::Query(e))
            }
            Err(_) => {
                // The statement may still be running server side
                tracing::warn!("Dropping PostgreSQL session after {:?} statement timeout", self.query_timeout);
                *session = None;
                Err(DbError::QueryTimeout(self.query_timeout))
            }
        }
    }

    async fn run(&self, stmt: &Statement, mode: FetchMode) -> Result<Vec<PgRow>, DbError> {
        let mut session = self.session.lock().await;
        let conn = self.ensure_open(&mut session).await?;

        let query = bind_params(stmt);
        let result = match mode {
            FetchMode::One => tokio::time::timeout(self.query_timeout, query.fetch_optional(&mut *conn))
                .await
                .map(|fetched| fetched.map(|row| row.into_iter().collect::<Vec<_>>())),
            FetchMode::All => tokio::time::timeout(self.query_timeout, query.fetch_all(&mut *conn)).await,
        };

        self.settle(&mut session, result)
    }

    /// Execute and fetch with bounded retries
    ///
    /// Empty results are retried as well as errors, since a read right after a
    /// write may briefly see nothing. Returns `Ok(None)` when at least one
    /// attempt completed without rows, and an error only when every attempt
    /// failed (or one failed in a way retrying cannot fix).
    pub async fn fetch_with_retry(
        &self,
        stmt: &Statement,
        mode: FetchMode,
    ) -> Result<Option<Vec<PgRow>>, DbError> {
        let outcome = retry_if(self.retry, "fetch_with_retry", DbError::is_retryable, |_| async move {
            let rows = self.run(stmt, mode).await?;
            Ok::<_, DbError>(if rows.is_empty() { None } else { Some(rows) })
        })
        .await;

        match outcome {
            Retried::Found(rows) => Ok(Some(rows)),
            Retried::Empty { attempts } => {
                tracing::debug!("No rows after {} attempts", attempts);
                Ok(None)
            }
            Retried::Failed { attempts, error } => Err(DbError::RetriesExhausted {
                attempts,
                source: Box::new(error),
            }),
        }
    }

    pub async fn begin(&self) -> Result<(), DbError> {
        self.simple("BEGIN").await
    }

    pub async fn commit(&self) -> Result<(), DbError> {
        self.simple("COMMIT").await
    }

    pub async fn rollback(&self) -> Result<(), DbError> {
        self.simple("ROLLBACK").await
    }

    async fn simple(&self, sql: &'static str) -> Result<(), DbError> {
        let mut session = self.session.lock().await;
        let conn = self.ensure_open(&mut session).await?;

        let result = tokio::time::timeout(self.query_timeout, sqlx::query(sql).execute(&mut *conn)).await;
        self.settle(&mut session, result).map(|_| ())
    }

    /// Release the session, if any
    pub async fn close(&self) -> Result<(), DbError> {
        if let Some(conn) = self.session.lock().await.take() {
            conn.close().await?;
            tracing::info!("PostgreSQL session closed");
        }
        Ok(())
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, DbError> {
        let stmt = Statement {
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
        };
        self.execute(&stmt).await.map(|rows| !rows.is_empty())
    }
}

fn bind_params(stmt: &Statement) -> Query<'_, Postgres, PgArguments> {
    stmt.params
        .iter()
        .fold(sqlx::query(&stmt.sql), |query, param| match param {
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Float(value) => query.bind(*value),
            SqlParam::Text(value) => query.bind(value.as_str()),
        })
}

fn property_from_row(row: &PgRow) -> Result<PropertyRecord, sqlx::Error> {
    Ok(PropertyRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        rooms: row.try_get("rooms")?,
        bathrooms: row.try_get("bathrooms")?,
        size: row.try_get("size")?,
        parking_space: row.try_get("parking_space")?,
        image_url: row.try_get("image_url")?,
        property_type: row.try_get("type")?,
        property_url: row.try_get("property_url")?,
        number: row.try_get("number")?,
        is_active: row.try_get("is_active")?,
        neighborhood_name: row.try_get("neighborhood_name")?,
        population: row.try_get("population")?,
        houses: row.try_get("houses")?,
        area: row.try_get("area")?,
        street_name: row.try_get("street_name")?,
        zip_code: row.try_get("zip_code")?,
        flood_quota: row.try_get("flood_quota")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        modality_name: row.try_get("modality_name")?,
        company_name: row.try_get("company_name")?,
    })
}

#[async_trait]
impl RowSource for ConnectionManager {
    async fn fetch_properties(
        &self,
        stmt: &Statement,
        mode: FetchMode,
    ) -> Result<Option<Vec<PropertyRecord>>, DbError> {
        let Some(rows) = self.fetch_with_retry(stmt, mode).await? else {
            return Ok(None);
        };

        rows.iter()
            .map(|row| property_from_row(row).map_err(|e| DbError::Decode(e.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    async fn fetch_count(&self, stmt: &Statement) -> Result<Option<i64>, DbError> {
        let Some(rows) = self.fetch_with_retry(stmt, FetchMode::One).await? else {
            return Ok(None);
        };

        rows.first()
            .map(|row| row.try_get::<i64, _>("quantity"))
            .transpose()
            .map_err(|e| DbError::Decode(e.to_string()))
    }
}
