use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_type: String,
    pub subject_id: String,
    pub state: String,
    pub request_id: u64,
    pub channel: Option<String>,
    pub amount: Option<String>,
    pub reference: Option<String>,
    pub content_hash: Option<String>,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: &str, subject_id: &str, state: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            subject_id: subject_id.to_string(),
            state: state.to_string(),
            request_id: mari_core::ids::next_request_id(),
            channel: None,
            amount: None,
            reference: None,
            content_hash: None,
            error: None,
        }
    }

    pub fn with_channel(mut self, channel: String) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_amount(mut self, amount: String) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_hash(mut self, hash: String) -> Self {
        self.content_hash = Some(hash);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

fn audit_log_path() -> PathBuf {
    PathBuf::from("audit.jsonl")
}

pub fn write_audit_event(event: &AuditEvent) -> Result<()> {
    write_audit_event_to(&audit_log_path(), event)
}

pub fn write_audit_event_to(path: &Path, event: &AuditEvent) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(event)?;
    writeln!(file, "{}", json)?;
    tracing::debug!(event_type=%event.event_type, subject_id=%event.subject_id, "Audit event written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn events_append_as_jsonl() {
        let path = std::env::temp_dir().join(format!(
            "mari_audit_test_{}.jsonl",
            rand::thread_rng().gen::<u64>()
        ));

        let event = AuditEvent::new("deposit_initiated", "attempt123", "initiated")
            .with_channel("mobile-wallet".into())
            .with_amount("5.00".into());
        write_audit_event_to(&path, &event).unwrap();
        write_audit_event_to(
            &path,
            &AuditEvent::new("deposit_settled", "attempt123", "settled"),
        )
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, "deposit_initiated");
        assert_eq!(first.channel.as_deref(), Some("mobile-wallet"));

        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert!(second.request_id > first.request_id);

        std::fs::remove_file(&path).ok();
    }
}
