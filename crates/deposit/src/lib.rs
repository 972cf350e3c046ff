//! Deposit initiation and status polling.
//!
//! [`DepositFlow`] is the portal-facing entry point: it validates input
//! before anything touches the network, initiates the deposit, records the
//! attempt in the local ledger and runs one owned [`PollSession`] at a time.

pub mod audit;
pub mod channel;
pub mod ledger;
pub mod session;

pub use channel::{build_request, poll_ceiling, POLL_INTERVAL};
pub use ledger::{AttemptRecord, Ledger};
pub use session::{PollPhase, PollSession};

use api_client::{ApiError, Channel, DepositRecord, PortalApi};
use audit::AuditEvent;
use mari_core::FieldErrors;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepositError {
    #[error("validation failed: {0}")]
    Invalid(FieldErrors),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("ledger: {0}")]
    Ledger(anyhow::Error),
}

impl From<anyhow::Error> for DepositError {
    fn from(e: anyhow::Error) -> Self {
        DepositError::Ledger(e)
    }
}

struct ActiveAttempt {
    attempt_id: String,
    session: PollSession,
}

/// Drives deposit attempts. Holds at most one live poll session; starting a
/// new attempt or resetting drops the previous session, which aborts its
/// timers before anything new is scheduled.
pub struct DepositFlow {
    api: Arc<dyn PortalApi>,
    ledger: Ledger,
    audit_path: PathBuf,
    active: Option<ActiveAttempt>,
}

impl DepositFlow {
    pub fn new(api: Arc<dyn PortalApi>, ledger: Ledger) -> Self {
        Self {
            api,
            ledger,
            audit_path: PathBuf::from("audit.jsonl"),
            active: None,
        }
    }

    pub fn with_audit_path(mut self, path: PathBuf) -> Self {
        self.audit_path = path;
        self
    }

    fn audit(&self, event: &AuditEvent) {
        // Audit failures must not break the money path.
        if let Err(e) = audit::write_audit_event_to(&self.audit_path, event) {
            tracing::warn!(error = %e, "failed to write audit event");
        }
    }

    /// Validate, initiate and start polling. Validation errors surface per
    /// field and nothing is sent. On success the returned record is the
    /// initiation response; the poll session is already running.
    pub async fn begin(
        &mut self,
        channel: Channel,
        amount: &str,
        wallet: Option<&str>,
    ) -> Result<DepositRecord, DepositError> {
        let req = channel::build_request(channel, amount, wallet).map_err(DepositError::Invalid)?;

        // Any state -> Idle: the previous loop's timers are released before
        // a new one is armed.
        self.active = None;

        let attempt = self.ledger.create_attempt(channel, req.amount)?;
        self.audit(
            &AuditEvent::new("deposit_initiated", &attempt.attempt_id, "initiated")
                .with_channel(channel.to_string())
                .with_amount(req.amount.to_string()),
        );

        let record = match self.api.initiate_deposit(channel, &req).await {
            Ok(record) => record,
            Err(e) => {
                let _ = self.ledger.update_attempt(&attempt.attempt_id, |r| {
                    r.state = "failed".into();
                    r.last_error = Some(e.to_string());
                });
                self.audit(
                    &AuditEvent::new("deposit_failed", &attempt.attempt_id, "failed")
                        .with_error(e.to_string()),
                );
                return Err(e.into());
            }
        };

        self.ledger.update_attempt(&attempt.attempt_id, |r| {
            r.state = "polling".into();
            r.deposit_id = Some(record.id.clone());
            r.status = Some(record.status);
        })?;

        let session = PollSession::start(Arc::clone(&self.api), channel, record.clone());
        self.active = Some(ActiveAttempt {
            attempt_id: attempt.attempt_id,
            session,
        });
        Ok(record)
    }

    pub fn session(&self) -> Option<&PollSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// Await the end of the active loop, record the outcome in the ledger
    /// and audit trail, and hand the final phase back.
    pub async fn wait(&self) -> Result<Option<PollPhase>, DepositError> {
        let Some(active) = &self.active else {
            return Ok(None);
        };
        let phase = active.session.finished().await;
        let record = phase.record().clone();

        let (state, event) = match &phase {
            PollPhase::Settled(_) => ("settled", "deposit_settled"),
            PollPhase::TimedOut(_) => ("timed_out", "deposit_timed_out"),
            PollPhase::Polling(_) => ("polling", "deposit_polling"),
        };
        self.ledger.update_attempt(&active.attempt_id, |r| {
            r.state = state.into();
            r.status = Some(record.status);
        })?;
        self.audit(
            &AuditEvent::new(event, &active.attempt_id, state)
                .with_reference(record.reference.clone()),
        );
        Ok(Some(phase))
    }

    /// Drop any active loop without waiting for it.
    pub fn reset(&mut self) {
        self.active = None;
    }

    /// Past attempts, newest first.
    pub fn history(&self) -> Result<Vec<AttemptRecord>, DepositError> {
        Ok(self.ledger.list()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::mock::MockClient;
    use api_client::DepositStatus;
    use mari_core::Amount;
    use rand::Rng;
    use std::time::Duration;

    fn flow_with(mock: &Arc<MockClient>) -> DepositFlow {
        let audit_path = std::env::temp_dir().join(format!(
            "mari_flow_audit_{}.jsonl",
            rand::thread_rng().gen::<u64>()
        ));
        DepositFlow::new(
            Arc::clone(mock) as Arc<dyn PortalApi>,
            Ledger::temporary().unwrap(),
        )
        .with_audit_path(audit_path)
    }

    #[tokio::test(start_paused = true)]
    async fn undersized_amount_never_reaches_the_network() {
        let mock = MockClient::new();
        let mut flow = flow_with(&mock);

        let err = flow
            .begin(Channel::MobileWallet, "0.05", Some("0771234567"))
            .await
            .unwrap_err();
        match err {
            DepositError::Invalid(errors) => {
                assert_eq!(errors.messages_for("amount"), ["must be at least 0.10"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(mock.last_deposit().is_none());
        assert!(flow.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn push_deposit_normalizes_and_settles() {
        let mock = MockClient::new();
        mock.script_deposit(
            DepositStatus::Pending,
            [DepositStatus::Pending, DepositStatus::Success],
        );
        let mut flow = flow_with(&mock);

        let record = flow
            .begin(Channel::MobileWallet, "5.00", Some("0771234567"))
            .await
            .unwrap();

        let (channel, sent) = mock.last_deposit().unwrap();
        assert_eq!(channel, Channel::MobileWallet);
        assert_eq!(sent.amount, Amount::from_cents(500));
        assert_eq!(sent.wallet_msisdn.unwrap().as_str(), "263771234567");

        let phase = flow.wait().await.unwrap().unwrap();
        match phase {
            PollPhase::Settled(rec) => assert_eq!(rec.status, DepositStatus::Success),
            other => panic!("expected settled, got {other:?}"),
        }
        assert_eq!(mock.status_calls(&record.id), 2);

        let history = flow.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, "settled");
        assert_eq!(history[0].status, Some(DepositStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn voucher_deposit_times_out_still_pending() {
        let mock = MockClient::new();
        let mut flow = flow_with(&mock);

        let record = flow.begin(Channel::Voucher, "1.00", None).await.unwrap();
        assert!(record.code.is_some());
        assert!(record.expires_at.is_some());

        let phase = flow.wait().await.unwrap().unwrap();
        match phase {
            PollPhase::TimedOut(rec) => assert_eq!(rec.status, DepositStatus::Pending),
            other => panic!("expected timeout, got {other:?}"),
        }

        let history = flow.history().unwrap();
        assert_eq!(history[0].state, "timed_out");
        assert_eq!(history[0].status, Some(DepositStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn new_attempt_stops_the_previous_loop() {
        let mock = MockClient::new();
        let mut flow = flow_with(&mock);

        let first = flow
            .begin(Channel::MobileWallet, "5.00", Some("0771234567"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let polled = mock.status_calls(&first.id);
        assert!(polled >= 2);

        let second = flow
            .begin(Channel::MobileWallet, "7.00", Some("0771234567"))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        tokio::time::sleep(Duration::from_secs(10)).await;
        // The first loop's timers are gone; only the new id is being polled.
        assert_eq!(mock.status_calls(&first.id), polled);
        assert!(mock.status_calls(&second.id) > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initiation_is_recorded_and_does_not_poll() {
        let mock = MockClient::new();
        mock.fail_next_initiate("channel temporarily unavailable");
        let mut flow = flow_with(&mock);

        let err = flow
            .begin(Channel::MobileWallet, "5.00", Some("0771234567"))
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::Api(ApiError::Api(_))));
        assert!(flow.session().is_none());

        let history = flow.history().unwrap();
        assert_eq!(history[0].state, "failed");
        assert_eq!(
            history[0].last_error.as_deref(),
            Some("channel temporarily unavailable")
        );
    }
}
