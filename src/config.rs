//! Configuration types for the lookup tool.

use crate::csv_io::EXPORT_FILE_NAME;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Batch pacing settings.
    #[serde(default)]
    pub settings: Settings,

    /// Geolocation service.
    #[serde(default)]
    pub geolocation: GeolocationConfig,

    /// DNS blacklist checks.
    #[serde(default)]
    pub reputation: ReputationConfig,

    /// CSV export.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Batch pacing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Wait between two records of a batch, in milliseconds.
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_ms: u64,

    /// Wait after the last record before a run reports completion.
    #[serde(default = "default_completion_delay")]
    pub completion_delay_ms: u64,
}

impl Settings {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pacing_delay_ms: default_pacing_delay(),
            completion_delay_ms: default_completion_delay(),
        }
    }
}

fn default_pacing_delay() -> u64 {
    100
}

fn default_completion_delay() -> u64 {
    500
}

/// Geolocation service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeolocationConfig {
    /// Base URL; the address is appended as the last path segment.
    #[serde(default = "default_geolocation_url")]
    pub base_url: String,

    /// Request timeout in milliseconds. Unset leaves the transport default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            base_url: default_geolocation_url(),
            timeout_ms: None,
        }
    }
}

fn default_geolocation_url() -> String {
    "https://ipwho.is".to_string()
}

/// DNS blacklist configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReputationConfig {
    /// DNS-over-HTTPS JSON endpoint.
    #[serde(default = "default_resolver_url")]
    pub resolver_url: String,

    /// Per-query timeout in milliseconds. Unset leaves the transport default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Zones queried for every address, in reporting order.
    #[serde(default = "default_zones")]
    pub zones: Vec<String>,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            resolver_url: default_resolver_url(),
            timeout_ms: None,
            zones: default_zones(),
        }
    }
}

fn default_resolver_url() -> String {
    "https://dns.google/resolve".to_string()
}

/// Blacklist zones checked when none are configured.
pub const DEFAULT_ZONES: [&str; 11] = [
    "zen.spamhaus.org",
    "bl.spamcop.net",
    "b.barracudacentral.org",
    "access.redhawk.org",
    "all.s5h.net",
    "bl.tiopan.com",
    "blackholes.wirehub.net",
    "blacklist.sci.kun.nl",
    "block.dnsbl.sorbs.net",
    "blocked.hilli.dk",
    "bogons.cymru.com",
];

fn default_zones() -> Vec<String> {
    DEFAULT_ZONES.iter().map(|z| z.to_string()).collect()
}

/// CSV export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// File name used when no output path is given.
    #[serde(default = "default_export_file_name")]
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: default_export_file_name(),
        }
    }
}

fn default_export_file_name() -> String {
    EXPORT_FILE_NAME.to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` references.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Err(e) = Url::parse(&self.geolocation.base_url) {
            anyhow::bail!(
                "Invalid geolocation base_url '{}': {}",
                self.geolocation.base_url,
                e
            );
        }

        if let Err(e) = Url::parse(&self.reputation.resolver_url) {
            anyhow::bail!(
                "Invalid reputation resolver_url '{}': {}",
                self.reputation.resolver_url,
                e
            );
        }

        if self.reputation.zones.is_empty() {
            anyhow::bail!("At least one reputation zone is required");
        }

        if let Some(zone) = self.reputation.zones.iter().find(|z| z.trim().is_empty()) {
            anyhow::bail!("Invalid reputation zone: '{}'", zone);
        }

        if self.export.file_name.trim().is_empty() {
            anyhow::bail!("export file_name must not be empty");
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# IP Geolocation Lookup Configuration

settings:
  pacing_delay_ms: 100         # Wait between records of a batch
  completion_delay_ms: 500     # Wait after the last record

# Geolocation service (GET <base_url>/<address>)
geolocation:
  base_url: "https://ipwho.is"
  # timeout_ms: 5000           # Unset: no timeout beyond the transport default

# DNS blacklist checks over DNS-over-HTTPS
reputation:
  resolver_url: "https://dns.google/resolve"
  # timeout_ms: 5000
  zones:
    - "zen.spamhaus.org"
    - "bl.spamcop.net"
    - "b.barracudacentral.org"
    - "access.redhawk.org"
    - "all.s5h.net"
    - "bl.tiopan.com"
    - "blackholes.wirehub.net"
    - "blacklist.sci.kun.nl"
    - "block.dnsbl.sorbs.net"
    - "blocked.hilli.dk"
    - "bogons.cymru.com"

export:
  file_name: "ip_geolocation_data.csv"
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> anyhow::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;

    let expanded = re.replace_all(content, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_default()
    });

    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.pacing_delay(), Duration::from_millis(100));
        assert_eq!(settings.completion_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_default_reputation_zones() {
        let config = ReputationConfig::default();
        assert_eq!(config.zones.len(), 11);
        assert_eq!(config.zones[0], "zen.spamhaus.org");
        assert_eq!(config.zones[10], "bogons.cymru.com");
        assert!(config.timeout_ms.is_none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_yaml(&Config::example()).unwrap();
        assert_eq!(config.geolocation.base_url, "https://ipwho.is");
        assert_eq!(config.reputation.zones.len(), 11);
        assert_eq!(config.export.file_name, "ip_geolocation_data.csv");
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_GEO_HOST", "geo.internal");
        let input = "base_url: \"https://${TEST_GEO_HOST}\"";
        let result = expand_env_vars(input).unwrap();
        assert_eq!(result, "base_url: \"https://geo.internal\"");
        std::env::remove_var("TEST_GEO_HOST");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let input = "file_name: \"${NONEXISTENT_VAR}\"";
        let result = expand_env_vars(input).unwrap();
        assert_eq!(result, "file_name: \"\"");
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
settings:
  pacing_delay_ms: 0

reputation:
  resolver_url: "https://cloudflare-dns.com/dns-query"
  timeout_ms: 2000
  zones:
    - "zen.spamhaus.org"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.settings.pacing_delay_ms, 0);
        assert_eq!(config.settings.completion_delay_ms, 500);
        assert_eq!(config.reputation.timeout_ms, Some(2000));
        assert_eq!(config.reputation.zones, vec!["zen.spamhaus.org"]);
        assert_eq!(config.geolocation.base_url, "https://ipwho.is");
    }

    #[test]
    fn test_validate_empty_zones() {
        let mut config = Config::default();
        config.reputation.zones.clear();
        assert!(config.validate().is_err());

        config.reputation.zones = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_urls() {
        let mut config = Config::default();
        config.geolocation.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reputation.resolver_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookup.yaml");
        std::fs::write(&path, "export:\n  file_name: \"results.csv\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.export.file_name, "results.csv");
    }
}
