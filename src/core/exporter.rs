use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

use crate::config::ExportSettings;
use crate::models::{ExportRow, Pagination, SearchFilter};
use crate::services::repository::{PropertyRepository, RepositoryError, RowSource};
use crate::services::storage::{ObjectStore, StorageError};

pub const DELIMITER: char = ';';
pub const QUOTE: char = '|';

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid export name: {0:?}")]
    InvalidName(String),

    #[error("Failed to write export file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Where an export lands inside the bucket prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// `{prefix}/{YYYY}/{MM}/{DD}/{uuid}.csv`
    Dated,
    /// `{prefix}/{name}.csv`; the name is limited to `[A-Za-z0-9_-]`
    Named(String),
}

/// Encode one delimited line
///
/// Fields containing the delimiter, the quote character or a line break are
/// quoted, with embedded quote characters doubled.
pub fn encode_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut line = String::new();

    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        if field.contains([DELIMITER, QUOTE, '\r', '\n']) {
            line.push(QUOTE);
            line.push_str(&field.replace(QUOTE, "||"));
            line.push(QUOTE);
        } else {
            line.push_str(field);
        }
    }

    line.push_str("\r\n");
    line
}

/// Streams every active property into a delimited file and publishes it
///
/// Rows are fetched one page at a time; only the current page is held in
/// memory. The total count is read once when the job starts, so rows inserted
/// while the export runs may or may not be included.
pub struct ExportPipeline<S: RowSource> {
    repository: PropertyRepository<S>,
    store: Arc<dyn ObjectStore>,
    page_size: u32,
    prefix: String,
    url_ttl_secs: u32,
}

impl<S: RowSource> ExportPipeline<S> {
    pub fn new(
        repository: PropertyRepository<S>,
        store: Arc<dyn ObjectStore>,
        settings: &ExportSettings,
        url_ttl_secs: u32,
    ) -> Self {
        Self {
            repository,
            store,
            page_size: settings.page_size.max(1),
            prefix: settings.prefix.trim_end_matches('/').to_string(),
            url_ttl_secs,
        }
    }

    pub fn remote_path(&self, target: &ExportTarget) -> Result<String, ExportError> {
        match target {
            ExportTarget::Dated => Ok(format!(
                "{}/{}/{}.csv",
                self.prefix,
                Utc::now().format("%Y/%m/%d"),
                Uuid::new_v4()
            )),
            ExportTarget::Named(name) => {
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !valid {
                    return Err(ExportError::InvalidName(name.clone()));
                }
                Ok(format!("{}/{}.csv", self.prefix, name))
            }
        }
    }

    /// Run the export and return a presigned URL, or `None` when there is nothing to export
    pub async fn export(&self, target: ExportTarget) -> Result<Option<String>, ExportError> {
        let remote_path = self.remote_path(&target)?;

        let total = self.repository.try_count_select_all(true).await?;
        if total <= 0 {
            tracing::info!("No active properties, skipping export");
            return Ok(None);
        }

        let temp = tempfile::Builder::new()
            .prefix("property-export-")
            .suffix(".csv")
            .tempfile()?;

        let written = self.write_rows(temp.reopen()?, total).await?;
        if written == 0 {
            tracing::warn!("Count reported {} properties but none were listed", total);
            return Ok(None);
        }

        tracing::info!("Saving file on bucket: {} ({} rows)", remote_path, written);
        self.store.upload(temp.path(), &remote_path).await?;

        let url = self.store.presign(&remote_path, self.url_ttl_secs).await?;
        Ok(Some(url))
    }

    /// Write header and rows, returning the number of data rows
    async fn write_rows(&self, file: std::fs::File, total: i64) -> Result<u64, ExportError> {
        let mut writer = BufWriter::new(tokio::fs::File::from_std(file));
        let filter = SearchFilter::default();

        let mut offset: u32 = 0;
        let mut page = self
            .repository
            .try_select_all(&filter, Pagination::new(self.page_size, offset))
            .await?;

        if page.is_empty() {
            return Ok(0);
        }

        writer
            .write_all(encode_row(ExportRow::HEADER).as_bytes())
            .await?;

        let mut written = 0u64;
        loop {
            for record in &page {
                let values = record.to_export_row().values();
                writer
                    .write_all(encode_row(values.iter().map(String::as_str)).as_bytes())
                    .await?;
                written += 1;
            }

            let short_page = page.len() < self.page_size as usize;
            offset = offset.saturating_add(self.page_size);
            if short_page || i64::from(offset) > total {
                break;
            }

            page = self
                .repository
                .try_select_all(&filter, Pagination::new(self.page_size, offset))
                .await?;
            if page.is_empty() {
                break;
            }
            tracing::debug!("Export page at offset {}: {} rows", offset, page.len());
        }

        writer.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain_fields() {
        assert_eq!(encode_row(["1", "Flat", "350000"]), "1;Flat;350000\r\n");
        assert_eq!(encode_row(["", "x"]), ";x\r\n");
    }

    #[test]
    fn test_encode_quotes_minimally() {
        assert_eq!(encode_row(["a;b", "c"]), "|a;b|;c\r\n");
        assert_eq!(encode_row(["pipe|here"]), "|pipe||here|\r\n");
        assert_eq!(encode_row(["two\nlines"]), "|two\nlines|\r\n");
    }

    #[test]
    fn test_header_line() {
        let header = encode_row(ExportRow::HEADER);
        assert!(header.starts_with("id;title;price;"));
        assert!(header.ends_with("modality_name;company_name\r\n"));
    }
}
