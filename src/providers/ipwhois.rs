//! ipwho.is-style geolocation provider.

use super::{build_client, GeoLookup, GeolocationProvider, ProviderError};
use crate::config::GeolocationConfig;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Geolocation over `GET <base_url>/<address>` returning JSON.
pub struct IpWhoisProvider {
    base_url: String,
    client: Client,
}

impl IpWhoisProvider {
    /// Create a new geolocation provider.
    pub fn new(config: &GeolocationConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: build_client(config.timeout_ms)?,
        })
    }

    fn lookup_url(&self, address: &str) -> String {
        format!("{}/{}", self.base_url, address)
    }
}

#[async_trait]
impl GeolocationProvider for IpWhoisProvider {
    async fn locate(&self, address: &str) -> Result<GeoLookup, ProviderError> {
        let url = self.lookup_url(address);

        debug!(ip = %address, "Querying geolocation service");

        let response = self.client.get(&url).send().await?;

        // Rejections come back as JSON bodies, so the status code is
        // informational only.
        let status = response.status();
        let body = response.text().await?;

        let lookup: GeoLookup = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("HTTP {}: failed to parse response: {}", status, e))
        })?;

        debug!(
            ip = %address,
            status = %status,
            success = lookup.is_success(),
            country = ?lookup.country,
            "Geolocation lookup complete"
        );

        Ok(lookup)
    }

    fn name(&self) -> &str {
        "ipwhois"
    }
}
