//! Lookup providers: geolocation and DNS blacklist checks.

pub mod dnsbl;
pub mod ipwhois;

use crate::record::BlacklistStatus;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Body returned by the geolocation service.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GeoLookup {
    /// Explicit outcome flag. Absent means success.
    #[serde(default)]
    pub success: Option<bool>,

    /// Failure description, when `success` is false.
    #[serde(default)]
    pub message: Option<String>,

    /// Country name, on success.
    #[serde(default)]
    pub country: Option<String>,
}

impl GeoLookup {
    /// True unless the service explicitly reported failure.
    pub fn is_success(&self) -> bool {
        self.success != Some(false)
    }
}

/// Error from a lookup provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    /// Body could not be read or decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP client could not be built.
    #[error("Client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(e)
        }
    }
}

/// Looks up the country of an address.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Query the service for `address`, passed through unvalidated.
    async fn locate(&self, address: &str) -> Result<GeoLookup, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Checks an address against blacklists.
///
/// Implementations never fail: anything that prevents a verdict is folded
/// into the returned status.
#[async_trait]
pub trait ReputationChecker: Send + Sync {
    async fn check(&self, address: &str) -> BlacklistStatus;

    /// Checker name for logging.
    fn name(&self) -> &str;
}

/// Build an HTTP client with an optional request timeout.
pub(crate) fn build_client(timeout_ms: Option<u64>) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder();
    if let Some(ms) = timeout_ms {
        builder = builder.timeout(Duration::from_millis(ms));
    }
    builder
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_lookup_success_flag() {
        let body: GeoLookup = serde_json::from_str(r#"{"country":"Australia"}"#).unwrap();
        assert!(body.is_success());
        assert_eq!(body.country.as_deref(), Some("Australia"));

        let body: GeoLookup =
            serde_json::from_str(r#"{"success":true,"country":"Japan","city":"Tokyo"}"#).unwrap();
        assert!(body.is_success());

        let body: GeoLookup =
            serde_json::from_str(r#"{"success":false,"message":"invalid"}"#).unwrap();
        assert!(!body.is_success());
        assert_eq!(body.message.as_deref(), Some("invalid"));
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(None).is_ok());
        assert!(build_client(Some(250)).is_ok());
    }

    #[test]
    fn test_provider_error_display() {
        assert_eq!(ProviderError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            ProviderError::InvalidResponse("not json".to_string()).to_string(),
            "Invalid response: not json"
        );
    }
}
