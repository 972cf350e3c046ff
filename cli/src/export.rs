//! Statement export.
//!
//! Writes a fetched page of transactions to CSV and returns the sha256
//! fingerprint of the written bytes so the audit trail can reference the
//! exact file contents.

use anyhow::{Context, Result};
use api_client::TransactionRecord;
use mari_core::digest::sha256_hex;
use std::path::Path;

const HEADER: &str = "id,kind,amount,currency,reference,description,status,created_at";

pub fn write_csv(path: &Path, items: &[TransactionRecord]) -> Result<String> {
    let mut out = String::with_capacity(items.len() * 96 + HEADER.len());
    out.push_str(HEADER);
    out.push('\n');

    for t in items {
        let row = [
            t.id.as_str(),
            t.kind.as_str(),
            &t.amount.to_string(),
            t.currency.as_str(),
            t.reference.as_str(),
            t.description.as_str(),
            t.status.as_str(),
            &t.created_at.to_rfc3339(),
        ]
        .map(csv_field)
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }

    std::fs::write(path, &out)
        .with_context(|| format!("failed to write export to {}", path.display()))?;
    Ok(sha256_hex(out.as_bytes()))
}

/// Quote a field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mari_core::Amount;

    fn record(description: &str) -> TransactionRecord {
        TransactionRecord {
            id: "txn_1".into(),
            kind: "airtime".into(),
            amount: Amount::from_cents(500),
            currency: "USD".into(),
            reference: "MAR-000001".into(),
            description: description.into(),
            status: "completed".into(),
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn plain_fields_stay_unquoted() {
        assert_eq!(csv_field("airtime"), "airtime");
    }

    #[test]
    fn delimiters_and_quotes_are_escaped() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn export_round_trips_and_fingerprints() {
        let path = std::env::temp_dir().join("mari_export_test.csv");
        let items = vec![record("Airtime for 263771234567"), record("note, with comma")];

        let fingerprint = write_csv(&path, &items).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(fingerprint, sha256_hex(written.as_bytes()));

        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].contains("MAR-000001"));
        assert!(lines[2].contains("\"note, with comma\""));

        std::fs::remove_file(&path).ok();
    }
}
