//! Parameter-bound statements against the joined property view.
//!
//! User-supplied values only ever travel as bind parameters. The single piece
//! of text spliced into the SQL is the schema qualifier, which comes from
//! process configuration and is validated as a bare identifier.

use std::fmt;

use thiserror::Error;

use crate::models::{Pagination, SearchFilter};

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid schema name: {0:?}")]
    InvalidSchema(String),
}

/// Trusted schema qualifier (the deployment environment name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaName(String);

impl SchemaName {
    /// Accepts `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (Postgres identifier limit)
    pub fn parse(name: &str) -> Result<Self, QueryError> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid_start && valid_rest && name.len() <= 63 {
            Ok(Self(name.to_string()))
        } else {
            Err(QueryError::InvalidSchema(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bind parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
}

/// SQL text with positional (`$n`) parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    /// Register a parameter and return its placeholder
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }
}

const PROPERTY_COLUMNS: &str = r#"
    p.id::int8 AS id,
    p.title,
    p.price::float8 AS price,
    p.description,
    p.rooms::int4 AS rooms,
    p.bathrooms::int4 AS bathrooms,
    p."size"::float8 AS "size",
    p.parking_space::int4 AS parking_space,
    p.image_url,
    p."type",
    p.property_url,
    p."number"::text AS "number",
    p.is_active,
    n."name" AS neighborhood_name,
    n.population::int8 AS population,
    n.houses::int8 AS houses,
    n.area::float8 AS area,
    s."name" AS street_name,
    s.zip_code,
    s.flood_quota::float8 AS flood_quota,
    s.latitude::text AS latitude,
    s.longitude::text AS longitude,
    m."name" AS modality_name,
    c."name" AS company_name"#;

fn joined_view(schema: &SchemaName) -> String {
    format!(
        r#"
FROM {schema}.properties p
INNER JOIN {schema}.neighborhoods n ON p.neighborhood_id = n.id
INNER JOIN {schema}.streets s ON p.street_id = s.id
INNER JOIN {schema}.modalities m ON p.modality_id = m.id
INNER JOIN {schema}.companies c ON p.company_id = c.id"#
    )
}

/// Statement builder for the property view
#[derive(Debug, Clone)]
pub struct PropertyQuery {
    schema: SchemaName,
}

impl PropertyQuery {
    pub fn new(schema: SchemaName) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaName {
        &self.schema
    }

    /// Single property by id, active or not
    pub fn select_by_id(&self, id: i64) -> Statement {
        let mut stmt = Statement::new(format!(
            "SELECT{}{}",
            PROPERTY_COLUMNS,
            joined_view(&self.schema)
        ));
        let id = stmt.bind(SqlParam::Int(id));
        stmt.sql.push_str(&format!("\nWHERE p.id = {}", id));
        stmt
    }

    pub fn count(&self, active_only: bool) -> Statement {
        let mut sql = format!(
            "SELECT COUNT(*) AS quantity{}",
            joined_view(&self.schema)
        );
        if active_only {
            sql.push_str("\nWHERE p.is_active IS TRUE");
        }
        Statement::new(sql)
    }

    /// Active properties matching every predicate present in `filter`
    pub fn select_all(&self, filter: &SearchFilter, page: Pagination) -> Statement {
        let mut stmt = Statement::new(format!(
            "SELECT{}{}",
            PROPERTY_COLUMNS,
            joined_view(&self.schema)
        ));

        let mut clauses = vec!["p.is_active IS TRUE".to_string()];

        if let Some(rooms) = filter.rooms {
            clauses.push(format!("p.rooms = {}", stmt.bind(SqlParam::Int(rooms.into()))));
        }
        if let Some(bathrooms) = filter.bathrooms {
            clauses.push(format!(
                "p.bathrooms = {}",
                stmt.bind(SqlParam::Int(bathrooms.into()))
            ));
        }
        if let Some(parking_space) = filter.parking_space {
            clauses.push(format!(
                "p.parking_space = {}",
                stmt.bind(SqlParam::Int(parking_space.into()))
            ));
        }
        if let Some((lower, upper)) = filter.size_band() {
            let lower = stmt.bind(SqlParam::Float(lower));
            let upper = stmt.bind(SqlParam::Float(upper));
            clauses.push(format!(
                r#"p."size"::float8 > {} AND p."size"::float8 < {}"#,
                lower, upper
            ));
        }
        if let Some(neighborhood) = &filter.neighborhood {
            clauses.push(format!(
                r#"n."name" = {}"#,
                stmt.bind(SqlParam::Text(neighborhood.clone()))
            ));
        }

        stmt.sql.push_str("\nWHERE ");
        stmt.sql.push_str(&clauses.join("\n  AND "));

        if page.is_bounded() {
            let limit = stmt.bind(SqlParam::Int(page.page_size.into()));
            let offset = stmt.bind(SqlParam::Int(page.offset.into()));
            stmt.sql
                .push_str(&format!("\nORDER BY p.id LIMIT {} OFFSET {}", limit, offset));
        }

        stmt
    }
}
