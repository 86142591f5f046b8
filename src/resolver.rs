//! Address resolution: country lookup followed by the blacklist check.

use crate::config::Config;
use crate::providers::dnsbl::DnsblChecker;
use crate::providers::ipwhois::IpWhoisProvider;
use crate::providers::{GeolocationProvider, ProviderError, ReputationChecker};
use crate::record::BlacklistStatus;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Message recorded when the geolocation service cannot be reached or read.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Failed to fetch location data";

/// Message recorded when the service rejects an address without saying why.
pub const DEFAULT_REJECTION_MESSAGE: &str = "Invalid IP address";

/// Country reported when the service omits one.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Why an address could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    /// The service rejected the address.
    Lookup(String),
    /// The service could not be reached or its answer could not be read.
    Transport,
}

impl ResolveFailure {
    pub fn message(&self) -> &str {
        match self {
            ResolveFailure::Lookup(message) => message,
            ResolveFailure::Transport => TRANSPORT_FAILURE_MESSAGE,
        }
    }
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of resolving one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Located {
        country: String,
        blacklist_status: BlacklistStatus,
    },
    Failed(ResolveFailure),
}

/// Resolves addresses through a geolocation provider and a blacklist checker.
pub struct GeolocationResolver {
    geolocation: Arc<dyn GeolocationProvider>,
    reputation: Arc<dyn ReputationChecker>,
}

impl GeolocationResolver {
    /// Create a resolver from its two providers.
    pub fn new(
        geolocation: Arc<dyn GeolocationProvider>,
        reputation: Arc<dyn ReputationChecker>,
    ) -> Self {
        Self {
            geolocation,
            reputation,
        }
    }

    /// Build the HTTP-backed resolver described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let geolocation = IpWhoisProvider::new(&config.geolocation)?;
        let reputation = DnsblChecker::new(&config.reputation)?;
        Ok(Self::new(Arc::new(geolocation), Arc::new(reputation)))
    }

    /// Resolve one address. Failures come back as [`Resolution::Failed`].
    pub async fn resolve(&self, address: &str) -> Resolution {
        let lookup = match self.geolocation.locate(address).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(
                    provider = self.geolocation.name(),
                    ip = %address,
                    error = %e,
                    "Geolocation lookup failed"
                );
                return Resolution::Failed(ResolveFailure::Transport);
            }
        };

        if !lookup.is_success() {
            let message = lookup
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string());
            debug!(ip = %address, message = %message, "Address rejected by geolocation service");
            return Resolution::Failed(ResolveFailure::Lookup(message));
        }

        let country = lookup
            .country
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

        let blacklist_status = self.reputation.check(address).await;

        Resolution::Located {
            country,
            blacklist_status,
        }
    }
}
