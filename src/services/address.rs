use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::config::ServiceSettings;
use crate::core::retry::{retry, Retried, RetryPolicy};
use crate::models::Address;

/// Errors that can occur when calling the address service
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {status} - {body}")]
    ApiError { status: StatusCode, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Zip-code lookup client
///
/// Every failure mode (transport, error status, unreadable body) is retried;
/// callers only ever see an address or nothing.
pub struct AddressResolver {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl AddressResolver {
    pub fn new(settings: &ServiceSettings, retry: RetryPolicy) -> Result<Self, AddressError> {
        let client = Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            retry,
        })
    }

    /// Resolve a zip code, or `None` once every attempt has failed or come back empty
    pub async fn resolve(&self, zip_code: &str) -> Option<Address> {
        tracing::info!("Searching address {}", zip_code);

        match retry(self.retry, "address lookup", |_| self.lookup_once(zip_code)).await {
            Retried::Found(address) => Some(address),
            Retried::Empty { attempts } => {
                tracing::debug!("No address for {} after {} attempts", zip_code, attempts);
                None
            }
            Retried::Failed { attempts, error } => {
                tracing::warn!(
                    "Address lookup for {} failed after {} attempts: {}",
                    zip_code,
                    attempts,
                    error
                );
                None
            }
        }
    }

    async fn lookup_once(&self, zip_code: &str) -> Result<Option<Address>, AddressError> {
        let url = format!(
            "{}/address/zip-code/{}",
            self.base_url,
            urlencoding::encode(zip_code)
        );

        tracing::debug!("Fetching address from: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(AddressError::ApiError { status, body });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| AddressError::InvalidResponse(format!("Failed to parse address: {}", e)))?;

        let empty = match &json {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            return Ok(None);
        }

        serde_json::from_value(json)
            .map(Some)
            .map_err(|e| AddressError::InvalidResponse(format!("Failed to parse address: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn resolver(base_url: &str) -> AddressResolver {
        let settings = ServiceSettings {
            base_url: base_url.to_string(),
            timeout_secs: Some(5),
        };
        AddressResolver::new(&settings, RetryPolicy::new(5, Duration::from_millis(1))).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_on_first_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/address/zip-code/89066-040")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"neighborhood_name": "Victor Konder", "flood_quota": 11.2}"#)
            .expect(1)
            .create_async()
            .await;

        let address = resolver(&server.url()).resolve("89066-040").await.unwrap();

        assert_eq!(address.neighborhood_name, "Victor Konder");
        assert_eq!(address.flood_quota, Some(11.2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_retried_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/address/zip-code/00000-000")
            .with_status(503)
            .with_body("upstream down")
            .expect(5)
            .create_async()
            .await;

        assert!(resolver(&server.url()).resolve("00000-000").await.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_body_is_retried_and_reported_absent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/address/zip-code/11111-111")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect(5)
            .create_async()
            .await;

        assert!(resolver(&server.url()).resolve("11111-111").await.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_zip_code_is_path_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/address/zip-code/89066%2F040")
            .with_status(200)
            .with_body(r#"{"neighborhood_name": "Garcia"}"#)
            .create_async()
            .await;

        let address = resolver(&format!("{}/", server.url())).resolve("89066/040").await;

        assert_eq!(address.map(|a| a.neighborhood_name).as_deref(), Some("Garcia"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_service_is_absent() {
        // Port 9 (discard) is closed on test hosts
        let address = resolver("http://127.0.0.1:9").resolve("89066-040").await;
        assert!(address.is_none());
    }
}
