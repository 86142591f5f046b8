//! DNS blacklist checks over a DNS-over-HTTPS JSON resolver.

use super::{build_client, ProviderError, ReputationChecker};
use crate::config::ReputationConfig;
use crate::record::BlacklistStatus;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Subset of the JSON resolver answer we care about.
#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(rename = "Answer", default)]
    answer: Option<Vec<serde_json::Value>>,
}

/// Queries every configured zone for `<reversed-address>.<zone>` A records.
pub struct DnsblChecker {
    resolver_url: String,
    zones: Vec<String>,
    client: Client,
}

impl DnsblChecker {
    /// Create a new checker.
    pub fn new(config: &ReputationConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            resolver_url: config.resolver_url.clone(),
            zones: config.zones.clone(),
            client: build_client(config.timeout_ms)?,
        })
    }

    /// Zones in reporting order.
    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    /// Whether the resolver returns any A record for `lookup`.
    async fn is_listed(&self, lookup: &str) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(&self.resolver_url)
            .query(&[("name", lookup), ("type", "A")])
            .send()
            .await?;

        let body: ResolveResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        Ok(body.answer.is_some_and(|answer| !answer.is_empty()))
    }
}

#[async_trait]
impl ReputationChecker for DnsblChecker {
    async fn check(&self, address: &str) -> BlacklistStatus {
        let reversed = reverse_octets(address);

        let queries = self.zones.iter().map(|zone| {
            let lookup = format!("{}.{}", reversed, zone);
            async move {
                match self.is_listed(&lookup).await {
                    Ok(listed) => listed,
                    Err(e) => {
                        debug!(zone = %zone, error = %e, "Zone query failed, treating as not listed");
                        false
                    }
                }
            }
        });

        let hits = join_all(queries).await;
        let status = aggregate(&self.zones, &hits);

        debug!(ip = %address, status = %status, "Blacklist check complete");

        status
    }

    fn name(&self) -> &str {
        "dnsbl"
    }
}

/// Reverse the dot-separated labels of an address.
///
/// Anything without dots, an IPv6 literal included, comes back unchanged.
pub fn reverse_octets(address: &str) -> String {
    address.split('.').rev().collect::<Vec<_>>().join(".")
}

/// Fold per-zone hits into a status, keeping zone order.
fn aggregate(zones: &[String], hits: &[bool]) -> BlacklistStatus {
    let listed: Vec<String> = zones
        .iter()
        .zip(hits)
        .filter(|(_, hit)| **hit)
        .map(|(zone, _)| zone.clone())
        .collect();

    if listed.is_empty() {
        BlacklistStatus::NotBlacklisted
    } else {
        BlacklistStatus::Blacklisted(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> Vec<String> {
        ReputationConfig::default().zones
    }

    #[test]
    fn test_reverse_octets() {
        assert_eq!(reverse_octets("1.2.3.4"), "4.3.2.1");
        assert_eq!(reverse_octets("127.0.0.2"), "2.0.0.127");
    }

    #[test]
    fn test_reverse_octets_other_forms() {
        assert_eq!(reverse_octets("2001:db8::1"), "2001:db8::1");
        assert_eq!(reverse_octets("1.2.3"), "3.2.1");
        assert_eq!(reverse_octets("999.999.999.999"), "999.999.999.999");
        assert_eq!(reverse_octets("1..3.4"), "4.3..1");
    }

    #[test]
    fn test_aggregate_no_hits() {
        let zones = zones();
        let hits = vec![false; zones.len()];
        assert_eq!(aggregate(&zones, &hits), BlacklistStatus::NotBlacklisted);
    }

    #[test]
    fn test_aggregate_keeps_zone_order() {
        let zones = zones();
        let mut hits = vec![false; zones.len()];
        hits[1] = true; // bl.spamcop.net
        hits[0] = true; // zen.spamhaus.org

        let status = aggregate(&zones, &hits);
        assert_eq!(
            status.to_string(),
            "Blacklisted in zen.spamhaus.org, bl.spamcop.net"
        );
    }

    #[test]
    fn test_checker_zones() {
        let checker = DnsblChecker::new(&ReputationConfig::default()).unwrap();
        assert_eq!(checker.zones().len(), 11);
        assert_eq!(checker.name(), "dnsbl");
    }
}
