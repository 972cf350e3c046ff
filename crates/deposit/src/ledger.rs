//! Client-local ledger of deposit attempts.
//!
//! Every attempt gets a record the moment the user submits the form, and the
//! record is updated by whole-record replacement as the attempt moves
//! through initiation, polling and its end state. The ledger survives
//! restarts, so the portal can show past attempts without asking the server.

use anyhow::{anyhow, Result};
use api_client::{Channel, DepositStatus};
use chrono::{DateTime, Utc};
use mari_core::Amount;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sled::Db;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: String,
    pub channel: Channel,
    pub amount: Amount,
    /// "initiated" | "polling" | "settled" | "timed_out" | "failed"
    pub state: String,
    pub deposit_id: Option<String>,
    pub status: Option<DepositStatus>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct Ledger {
    db: Db,
}

impl Ledger {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// In-memory ledger for tests.
    pub fn temporary() -> Result<Self> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    fn attempts(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("attempts")?)
    }

    pub fn create_attempt(&self, channel: Channel, amount: Amount) -> Result<AttemptRecord> {
        let now = Utc::now();
        let rec = AttemptRecord {
            attempt_id: generate_attempt_id(),
            channel,
            amount,
            state: "initiated".to_string(),
            deposit_id: None,
            status: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.attempts()?
            .insert(rec.attempt_id.as_bytes(), serde_json::to_vec(&rec)?)?;
        Ok(rec)
    }

    pub fn update_attempt<F>(&self, attempt_id: &str, mut f: F) -> Result<AttemptRecord>
    where
        F: FnMut(&mut AttemptRecord),
    {
        let attempts = self.attempts()?;
        let key = attempt_id.as_bytes();
        let existing = attempts
            .get(key)?
            .ok_or_else(|| anyhow!("attempt not found: {attempt_id}"))?;
        let mut rec: AttemptRecord = serde_json::from_slice(&existing)?;
        f(&mut rec);
        rec.updated_at = Utc::now();
        attempts.insert(key, serde_json::to_vec(&rec)?)?;
        Ok(rec)
    }

    /// All attempts, newest first.
    pub fn list(&self) -> Result<Vec<AttemptRecord>> {
        let mut out = Vec::new();
        for item in self.attempts()?.iter() {
            let (_k, v) = item?;
            let rec: AttemptRecord = serde_json::from_slice(&v)?;
            out.push(rec);
        }
        out.sort_by_key(|r| r.created_at);
        out.reverse();
        Ok(out)
    }
}

fn generate_attempt_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}
