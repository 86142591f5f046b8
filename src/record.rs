//! Per-address records and batch progress.

use std::fmt;

/// Lifecycle of a single address within a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordStatus {
    /// Accepted, not yet submitted.
    #[default]
    Pending,
    /// Part of a running batch, waiting for its lookup.
    Loading,
    /// Country lookup succeeded.
    Resolved,
    /// Country lookup failed; see `error_message`.
    Failed,
}

/// DNS blacklist verdict for an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BlacklistStatus {
    /// No check has completed for this record.
    #[default]
    Unset,
    /// Undetermined verdict. Unset statuses export under this label.
    NotSure,
    /// No configured zone lists the address.
    NotBlacklisted,
    /// Zones listing the address, in configured zone order.
    Blacklisted(Vec<String>),
}

impl BlacklistStatus {
    /// Label used in exports, where an unset status reads as "Not sure".
    pub fn export_label(&self) -> String {
        match self {
            BlacklistStatus::Unset => BlacklistStatus::NotSure.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, BlacklistStatus::Unset)
    }
}

impl fmt::Display for BlacklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlacklistStatus::Unset => Ok(()),
            BlacklistStatus::NotSure => write!(f, "Not sure"),
            BlacklistStatus::NotBlacklisted => write!(f, "Not blacklisted"),
            BlacklistStatus::Blacklisted(zones) => {
                write!(f, "Blacklisted in {}", zones.join(", "))
            }
        }
    }
}

/// One address under evaluation.
///
/// Fields are read-only from outside the crate; the `mark_*` transitions keep
/// `error_message` present exactly when the record has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    origin: String,
    country: String,
    status: RecordStatus,
    error_message: Option<String>,
    blacklist_status: BlacklistStatus,
}

impl AddressRecord {
    /// Create a pending record for an address.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            country: String::new(),
            status: RecordStatus::Pending,
            error_message: None,
            blacklist_status: BlacklistStatus::Unset,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn blacklist_status(&self) -> &BlacklistStatus {
        &self.blacklist_status
    }

    /// Country column as shown to users: the error text replaces the country.
    pub fn display_country(&self) -> &str {
        self.error_message.as_deref().unwrap_or(&self.country)
    }

    pub(crate) fn mark_loading(&mut self) {
        self.clear_result();
        self.status = RecordStatus::Loading;
    }

    pub(crate) fn mark_pending(&mut self) {
        self.clear_result();
        self.status = RecordStatus::Pending;
    }

    pub(crate) fn mark_resolved(&mut self, country: String, blacklist_status: BlacklistStatus) {
        self.country = country;
        self.blacklist_status = blacklist_status;
        self.error_message = None;
        self.status = RecordStatus::Resolved;
    }

    pub(crate) fn mark_failed(&mut self, message: String) {
        self.country.clear();
        self.blacklist_status = BlacklistStatus::Unset;
        self.error_message = Some(message);
        self.status = RecordStatus::Failed;
    }

    fn clear_result(&mut self) {
        self.country.clear();
        self.error_message = None;
        self.blacklist_status = BlacklistStatus::Unset;
    }
}

/// Aggregate progress of the current batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub percent: u8,
}

impl BatchProgress {
    /// Fresh progress for a run over `total` records.
    pub fn start(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            percent: 0,
        }
    }

    /// Count one more processed record.
    pub fn advance(&mut self) {
        self.processed = (self.processed + 1).min(self.total);
        self.percent = percent_of(self.processed, self.total);
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.processed == self.total
    }
}

fn percent_of(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_status_labels() {
        assert_eq!(BlacklistStatus::Unset.to_string(), "");
        assert_eq!(BlacklistStatus::NotSure.to_string(), "Not sure");
        assert_eq!(BlacklistStatus::NotBlacklisted.to_string(), "Not blacklisted");

        let listed = BlacklistStatus::Blacklisted(vec![
            "zen.spamhaus.org".to_string(),
            "bl.spamcop.net".to_string(),
        ]);
        assert_eq!(
            listed.to_string(),
            "Blacklisted in zen.spamhaus.org, bl.spamcop.net"
        );
    }

    #[test]
    fn test_export_label_defaults_to_not_sure() {
        assert_eq!(BlacklistStatus::Unset.export_label(), "Not sure");
        assert_eq!(
            BlacklistStatus::NotBlacklisted.export_label(),
            "Not blacklisted"
        );
    }

    #[test]
    fn test_record_transitions() {
        let mut record = AddressRecord::new("8.8.8.8");
        assert_eq!(record.status(), RecordStatus::Pending);
        assert!(record.country().is_empty());

        record.mark_loading();
        assert_eq!(record.status(), RecordStatus::Loading);

        record.mark_resolved("United States".to_string(), BlacklistStatus::NotBlacklisted);
        assert_eq!(record.status(), RecordStatus::Resolved);
        assert_eq!(record.country(), "United States");
        assert!(record.error_message().is_none());

        record.mark_loading();
        assert!(record.country().is_empty());
        assert!(record.blacklist_status().is_unset());

        record.mark_failed("invalid".to_string());
        assert_eq!(record.status(), RecordStatus::Failed);
        assert_eq!(record.error_message(), Some("invalid"));
        assert_eq!(record.display_country(), "invalid");
        assert!(record.blacklist_status().is_unset());
    }

    #[test]
    fn test_progress_percent_rounding() {
        let mut progress = BatchProgress::start(3);
        progress.advance();
        assert_eq!(progress.percent, 33);
        progress.advance();
        assert_eq!(progress.percent, 67);
        progress.advance();
        assert_eq!(progress.percent, 100);
        assert!(progress.is_complete());

        // Never runs past the total
        progress.advance();
        assert_eq!(progress.processed, 3);
    }

    #[test]
    fn test_progress_empty_batch() {
        let progress = BatchProgress::start(0);
        assert_eq!(progress.percent, 0);
        assert!(!progress.is_complete());
    }
}
