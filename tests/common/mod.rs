//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use property_core::core::{SqlParam, Statement};
use property_core::models::PropertyRecord;
use property_core::services::{DbError, FetchMode, ObjectStore, RowSource, StorageError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn property(id: i64) -> PropertyRecord {
    PropertyRecord {
        id,
        title: format!("Apartment {}", id),
        description: Some("Sunny corner unit".to_string()),
        price: 350_000.0 + id as f64,
        rooms: Some(2),
        bathrooms: Some(2),
        size: Some(100.0),
        parking_space: Some(1),
        image_url: Some(format!("https://img.test/{}.jpg", id)),
        property_type: "apartment".to_string(),
        property_url: None,
        number: Some("12A".to_string()),
        is_active: true,
        neighborhood_name: Some("Victor Konder".to_string()),
        population: 4_000,
        houses: 1_200,
        area: 1.5,
        street_name: Some("Rua Almirante Barroso".to_string()),
        zip_code: Some("89066-040".to_string()),
        flood_quota: Some(12.5),
        latitude: Some("-26.9".to_string()),
        longitude: Some("-49.07".to_string()),
        modality_name: Some("sale".to_string()),
        company_name: "Acme Realty".to_string(),
    }
}

pub fn properties(n: i64) -> Vec<PropertyRecord> {
    (1..=n).map(property).collect()
}

/// In-memory stand-in for the database
///
/// Evaluates the statements produced by `PropertyQuery` against a fixed row
/// set, so repository behaviour can be checked without PostgreSQL.
#[derive(Default)]
pub struct FakeRows {
    rows: Vec<PropertyRecord>,
    failing: AtomicBool,
    count_override: Option<i64>,
    pub count_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
}

impl FakeRows {
    pub fn new(rows: Vec<PropertyRecord>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count_override = Some(count);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn unavailable(&self) -> Result<(), DbError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DbError::RetriesExhausted {
                attempts: 5,
                source: Box::new(DbError::NotConnected),
            });
        }
        Ok(())
    }
}

fn param<'a>(stmt: &'a Statement, placeholder: &str) -> &'a SqlParam {
    let index: usize = placeholder
        .trim_start_matches('$')
        .parse()
        .expect("placeholder");
    &stmt.params[index - 1]
}

fn int(param: &SqlParam) -> i64 {
    match param {
        SqlParam::Int(value) => *value,
        other => panic!("expected int, got {:?}", other),
    }
}

fn float(param: &SqlParam) -> f64 {
    match param {
        SqlParam::Float(value) => *value,
        other => panic!("expected float, got {:?}", other),
    }
}

fn text(param: &SqlParam) -> &str {
    match param {
        SqlParam::Text(value) => value,
        other => panic!("expected text, got {:?}", other),
    }
}

/// Apply one WHERE clause to a record
fn clause_matches(stmt: &Statement, clause: &str, record: &PropertyRecord) -> bool {
    let tokens: Vec<&str> = clause.split_whitespace().collect();
    match tokens[0] {
        "p.is_active" => record.is_active,
        "p.id" => record.id == int(param(stmt, tokens[2])),
        "p.rooms" => record.rooms.map(i64::from) == Some(int(param(stmt, tokens[2]))),
        "p.bathrooms" => record.bathrooms.map(i64::from) == Some(int(param(stmt, tokens[2]))),
        "p.parking_space" => {
            record.parking_space.map(i64::from) == Some(int(param(stmt, tokens[2])))
        }
        r#"p."size"::float8"# => {
            let lower = float(param(stmt, tokens[2]));
            let upper = float(param(stmt, tokens[6]));
            record.size.is_some_and(|size| size > lower && size < upper)
        }
        r#"n."name""# => record.neighborhood_name.as_deref() == Some(text(param(stmt, tokens[2]))),
        other => panic!("unexpected clause: {}", other),
    }
}

impl FakeRows {
    fn evaluate(&self, stmt: &Statement) -> Vec<PropertyRecord> {
        let (where_part, window) = match stmt.sql.split_once("\nORDER BY p.id ") {
            Some((head, tail)) => {
                let tokens: Vec<&str> = tail.split_whitespace().collect();
                let limit = int(param(stmt, tokens[1])) as usize;
                let offset = int(param(stmt, tokens[3])) as usize;
                (head, Some((limit, offset)))
            }
            None => (stmt.sql.as_str(), None),
        };

        let clauses: Vec<&str> = match where_part.split_once("\nWHERE ") {
            Some((_, conditions)) => conditions.split("\n  AND ").collect(),
            None => Vec::new(),
        };

        let mut rows: Vec<PropertyRecord> = self
            .rows
            .iter()
            .filter(|record| clauses.iter().all(|c| clause_matches(stmt, c, record)))
            .cloned()
            .collect();
        rows.sort_by_key(|record| record.id);

        match window {
            Some((limit, offset)) => rows.into_iter().skip(offset).take(limit).collect(),
            None => rows,
        }
    }
}

#[async_trait]
impl RowSource for FakeRows {
    async fn fetch_properties(
        &self,
        stmt: &Statement,
        mode: FetchMode,
    ) -> Result<Option<Vec<PropertyRecord>>, DbError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.unavailable()?;

        let mut rows = self.evaluate(stmt);
        if mode == FetchMode::One {
            rows.truncate(1);
        }
        Ok((!rows.is_empty()).then_some(rows))
    }

    async fn fetch_count(&self, stmt: &Statement) -> Result<Option<i64>, DbError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.unavailable()?;

        if let Some(count) = self.count_override {
            return Ok(Some(count));
        }
        Ok(Some(self.evaluate(stmt).len() as i64))
    }
}

/// Object store keeping uploads in memory
#[derive(Default)]
pub struct MemoryObjectStore {
    pub uploads: Mutex<HashMap<String, String>>,
}

impl MemoryObjectStore {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn contents(&self, remote_path: &str) -> Option<String> {
        self.uploads.lock().unwrap().get(remote_path).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), StorageError> {
        let contents = tokio::fs::read_to_string(local_path).await?;
        self.uploads
            .lock()
            .unwrap()
            .insert(remote_path.to_string(), contents);
        Ok(())
    }

    async fn presign(&self, remote_path: &str, ttl_secs: u32) -> Result<String, StorageError> {
        Ok(format!("memory://exports/{}?expires={}", remote_path, ttl_secs))
    }
}
