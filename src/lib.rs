//! IP geolocation and DNS blacklist lookups.
//!
//! Resolves IP addresses to their country of origin and checks them against
//! public DNS blacklists, one address at a time or in CSV-driven batches, and
//! exports the results as CSV.
//!
//! # Features
//!
//! - **Geolocation** - Country lookup through an ipwho.is-compatible service
//! - **DNS Blacklists** - Concurrent DNS-over-HTTPS queries against a fixed zone list
//! - **Batches** - Sequential, paced processing with progress reporting
//! - **Cancellation** - Runs stop at the next suspension point when their token fires
//! - **CSV** - Import an `origin` column, export `origin,country,blacklistStatus`
//!
//! # Example Configuration
//!
//! ```yaml
//! settings:
//!   pacing_delay_ms: 100
//!   completion_delay_ms: 500
//!
//! geolocation:
//!   base_url: "https://ipwho.is"
//!
//! reputation:
//!   resolver_url: "https://dns.google/resolve"
//!   zones:
//!     - "zen.spamhaus.org"
//!     - "bl.spamcop.net"
//! ```

pub mod batch;
pub mod config;
pub mod csv_io;
pub mod providers;
pub mod record;
pub mod resolver;
pub mod shutdown;

pub use batch::{BatchOrchestrator, RunOutcome};
pub use config::Config;
pub use record::{AddressRecord, BatchProgress, BlacklistStatus, RecordStatus};
pub use resolver::{GeolocationResolver, Resolution, ResolveFailure};
