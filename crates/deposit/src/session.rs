//! Bounded status polling for a single deposit.
//!
//! A [`PollSession`] owns one spawned task that drives the whole loop: an
//! immediate first query, a fixed 2-second interval after that, and an
//! independent ceiling deadline that stops the loop no matter how many polls
//! have run. Both timers live inside the task, so aborting the task on any
//! exit path (terminal status, ceiling, explicit stop, owner teardown)
//! releases them together. The task awaits each response before arming the
//! next tick; two status requests are never in flight for one deposit, so
//! a stale response can never overwrite a newer one.

use crate::channel::{poll_ceiling, POLL_INTERVAL};
use api_client::{Channel, DepositRecord, PortalApi};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};

/// Where the loop currently stands. Each variant carries the latest cached
/// record; the record is only ever replaced wholesale.
#[derive(Debug, Clone)]
pub enum PollPhase {
    /// Loop running; record is the most recent response.
    Polling(DepositRecord),
    /// A terminal status arrived; no further queries will be issued.
    Settled(DepositRecord),
    /// Ceiling elapsed first; the record keeps whatever was last observed,
    /// commonly still pending. The user may retry manually.
    TimedOut(DepositRecord),
}

impl PollPhase {
    pub fn record(&self) -> &DepositRecord {
        match self {
            PollPhase::Polling(r) | PollPhase::Settled(r) | PollPhase::TimedOut(r) => r,
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, PollPhase::Polling(_))
    }
}

/// One polling loop for one deposit id. Constructed fresh per attempt and
/// owned by whoever initiated the deposit; dropping it aborts the loop.
pub struct PollSession {
    deposit_id: String,
    phase_rx: watch::Receiver<PollPhase>,
    task: JoinHandle<()>,
}

impl PollSession {
    /// Begin polling. If the backend settled the deposit at initiation, the
    /// session reports `Settled` without issuing a single status query.
    pub fn start(api: Arc<dyn PortalApi>, channel: Channel, record: DepositRecord) -> Self {
        let deposit_id = record.id.clone();
        let (tx, phase_rx) = watch::channel(PollPhase::Polling(record.clone()));
        let task = tokio::spawn(poll_loop(api, channel, record, tx));
        Self {
            deposit_id,
            phase_rx,
            task,
        }
    }

    pub fn deposit_id(&self) -> &str {
        &self.deposit_id
    }

    /// Snapshot of the current phase.
    pub fn phase(&self) -> PollPhase {
        self.phase_rx.borrow().clone()
    }

    /// Watch phase changes without holding the session.
    pub fn subscribe(&self) -> watch::Receiver<PollPhase> {
        self.phase_rx.clone()
    }

    /// Wait for the loop to reach `Settled` or `TimedOut`.
    pub async fn finished(&self) -> PollPhase {
        let mut rx = self.phase_rx.clone();
        loop {
            {
                let phase = rx.borrow_and_update();
                if phase.is_finished() {
                    return phase.clone();
                }
            }
            if rx.changed().await.is_err() {
                // Task gone; the last value it sent stands.
                return rx.borrow().clone();
            }
        }
    }

    /// Stop polling now. Equivalent to dropping the session.
    pub fn stop(self) {}
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_loop(
    api: Arc<dyn PortalApi>,
    channel: Channel,
    mut record: DepositRecord,
    tx: watch::Sender<PollPhase>,
) {
    if record.status.is_terminal() {
        tracing::info!(deposit_id = %record.id, status = %record.status, "deposit settled at initiation");
        let _ = tx.send(PollPhase::Settled(record));
        return;
    }

    let deadline = Instant::now() + poll_ceiling(channel);
    let mut ticker = interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick completes immediately; the ceiling wins over any tick
        // or in-flight query that would land past it.
        if timeout_at(deadline, ticker.tick()).await.is_err() {
            tracing::info!(deposit_id = %record.id, status = %record.status, "poll ceiling reached");
            let _ = tx.send(PollPhase::TimedOut(record));
            return;
        }

        let outcome = timeout_at(deadline, api.deposit_status(channel, &record.id)).await;
        match outcome {
            Err(_) => {
                tracing::info!(deposit_id = %record.id, status = %record.status, "poll ceiling reached");
                let _ = tx.send(PollPhase::TimedOut(record));
                return;
            }
            Ok(Ok(latest)) => {
                // Whole-record replacement, never a partial patch.
                record = latest;
                if record.status.is_terminal() {
                    tracing::info!(deposit_id = %record.id, status = %record.status, "deposit settled");
                    let _ = tx.send(PollPhase::Settled(record));
                    return;
                }
                let _ = tx.send(PollPhase::Polling(record.clone()));
            }
            Ok(Err(err)) => {
                // Transient; the next scheduled tick is the retry.
                tracing::warn!(deposit_id = %record.id, error = %err, "status query failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::mock::MockClient;
    use api_client::{DepositRequest, DepositStatus};
    use mari_core::{Amount, Msisdn};
    use std::time::Duration;

    async fn initiate(
        mock: &Arc<MockClient>,
        channel: Channel,
    ) -> (DepositRecord, Arc<MockClient>) {
        let req = DepositRequest {
            amount: Amount::from_cents(500),
            wallet_msisdn: match channel {
                Channel::MobileWallet => Some(Msisdn::normalize("0771234567").unwrap()),
                Channel::Voucher => None,
            },
        };
        let record = mock.initiate_deposit(channel, &req).await.unwrap();
        (record, Arc::clone(mock))
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_terminal_status() {
        let mock = MockClient::new();
        mock.script_deposit(
            DepositStatus::Pending,
            [DepositStatus::Pending, DepositStatus::Success],
        );
        let (record, api) = initiate(&mock, Channel::MobileWallet).await;
        let id = record.id.clone();

        let session = PollSession::start(api, Channel::MobileWallet, record);
        let phase = session.finished().await;

        match &phase {
            PollPhase::Settled(rec) => assert_eq!(rec.status, DepositStatus::Success),
            other => panic!("expected settled, got {other:?}"),
        }
        // Pending at t=0, success at t=2: exactly two queries.
        assert_eq!(mock.status_calls(&id), 2);

        // No further requests for a settled deposit.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.status_calls(&id), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_record_retained() {
        let mock = MockClient::new();
        // Script stays empty: every poll answers pending.
        let (record, api) = initiate(&mock, Channel::Voucher).await;
        let id = record.id.clone();
        assert!(record.code.is_some());
        assert!(record.expires_at.is_some());

        let session = PollSession::start(api, Channel::Voucher, record);
        let phase = session.finished().await;

        match &phase {
            PollPhase::TimedOut(rec) => assert_eq!(rec.status, DepositStatus::Pending),
            other => panic!("expected timed out, got {other:?}"),
        }
        // 15s ceiling at one query per 2s, first at t=0: ticks 0..=14.
        assert_eq!(mock.status_calls(&id), 8);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.status_calls(&id), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn instant_settlement_issues_no_queries() {
        let mock = MockClient::new();
        mock.script_deposit(DepositStatus::Success, []);
        let (record, api) = initiate(&mock, Channel::MobileWallet).await;
        let id = record.id.clone();

        let session = PollSession::start(api, Channel::MobileWallet, record);
        let phase = session.finished().await;

        assert!(matches!(phase, PollPhase::Settled(_)));
        assert_eq!(mock.status_calls(&id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_do_not_stop_the_loop() {
        let mock = MockClient::new();
        mock.script_deposit(DepositStatus::Pending, [DepositStatus::Success]);
        mock.fail_polls(2);
        let (record, api) = initiate(&mock, Channel::MobileWallet).await;
        let id = record.id.clone();

        let session = PollSession::start(api, Channel::MobileWallet, record);
        let phase = session.finished().await;

        match &phase {
            PollPhase::Settled(rec) => assert_eq!(rec.status, DepositStatus::Success),
            other => panic!("expected settled, got {other:?}"),
        }
        // Two failed queries swallowed, third succeeds.
        assert_eq!(mock.status_calls(&id), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_session_stops_the_timers() {
        let mock = MockClient::new();
        let (record, api) = initiate(&mock, Channel::MobileWallet).await;
        let id = record.id.clone();

        let session = PollSession::start(api, Channel::MobileWallet, record);
        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = mock.status_calls(&id);
        assert!(before >= 2);

        drop(session);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(mock.status_calls(&id), before);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_phase_carries_latest_record() {
        let mock = MockClient::new();
        mock.script_deposit(DepositStatus::Pending, [DepositStatus::Pending]);
        let (record, api) = initiate(&mock, Channel::MobileWallet).await;

        let session = PollSession::start(api, Channel::MobileWallet, record);
        tokio::time::sleep(Duration::from_secs(1)).await;

        match session.phase() {
            PollPhase::Polling(rec) => assert_eq!(rec.status, DepositStatus::Pending),
            other => panic!("expected polling, got {other:?}"),
        }
        drop(session);
    }
}
