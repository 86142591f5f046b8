//! CSV import of addresses and export of lookup results.

use crate::record::AddressRecord;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Column holding the address in imported files.
pub const ORIGIN_COLUMN: &str = "origin";

/// File name offered for exported results.
pub const EXPORT_FILE_NAME: &str = "ip_geolocation_data.csv";

/// MIME type of exported results.
pub const EXPORT_MIME_TYPE: &str = "text/csv";

const EXPORT_HEADER: [&str; 3] = [ORIGIN_COLUMN, "country", "blacklistStatus"];

/// Errors from reading or writing CSV files.
#[derive(Debug, Error)]
pub enum CsvError {
    /// The file could not be parsed as CSV.
    #[error("Error parsing CSV file: {0}")]
    Parse(#[source] csv::Error),

    /// The file parsed but held no usable address.
    #[error("No valid IP addresses detected in the uploaded file")]
    Empty,

    /// A result row could not be written.
    #[error("Error writing CSV: {0}")]
    Write(#[source] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Read the `origin` column from header-based CSV.
///
/// Rows where the column is missing or blank are skipped. Kept values are
/// returned as written. Only the `origin` field is decoded, lossily, so bytes
/// that are not UTF-8 in other columns are ignored.
pub fn parse_addresses<R: io::Read>(rdr: R) -> Result<Vec<String>, CsvError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);

    let origin_index = rdr
        .byte_headers()
        .map_err(CsvError::Parse)?
        .iter()
        .position(|header| header == ORIGIN_COLUMN.as_bytes());

    let mut addresses = Vec::new();
    let mut skipped = 0usize;

    for row in rdr.byte_records() {
        let row = row.map_err(CsvError::Parse)?;
        let origin = origin_index
            .and_then(|i| row.get(i))
            .map(String::from_utf8_lossy);

        match origin {
            Some(origin) if !origin.trim().is_empty() => addresses.push(origin.into_owned()),
            _ => skipped += 1,
        }
    }

    debug!(
        addresses = addresses.len(),
        skipped = skipped,
        has_origin_column = origin_index.is_some(),
        "Parsed address CSV"
    );

    if addresses.is_empty() {
        return Err(CsvError::Empty);
    }

    Ok(addresses)
}

/// Convenience wrapper over [`parse_addresses`] for in-memory text.
pub fn parse_addresses_str(contents: &str) -> Result<Vec<String>, CsvError> {
    parse_addresses(contents.as_bytes())
}

/// Render records as CSV with columns `origin,country,blacklistStatus`.
pub fn serialize_results(records: &[AddressRecord]) -> Result<String, CsvError> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    wtr.write_record(EXPORT_HEADER).map_err(CsvError::Write)?;

    for record in records {
        let blacklist = record.blacklist_status().export_label();
        wtr.write_record([record.origin(), record.display_country(), blacklist.as_str()])
            .map_err(CsvError::Write)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| CsvError::Io(io::Error::new(e.error().kind(), e.error().to_string())))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Serialize records and write them to `path`.
pub fn write_results(path: &Path, records: &[AddressRecord]) -> Result<(), CsvError> {
    let csv = serialize_results(records)?;
    std::fs::write(path, csv)?;
    Ok(())
}
