//! Monthly accrual scheduler.
//!
//! A single perpetual suspend/wake loop: sleep until the first instant of the
//! next calendar month, then run one reconciliation pass over a fresh ledger
//! snapshot, emitting one notice per relationship. Delivery failures are
//! logged and skipped; the loop only ends on cancellation.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{accrues_interest, monthly_interest},
    domain::UserId,
    ledger::Ledger,
    messaging::port::NotificationSink,
    utils::{AuditEvent, AuditLogger},
};

/// One outbound notice, addressed to the borrower of one relationship.
#[derive(Clone, Copy, Debug)]
pub struct AccrualNotice {
    pub borrower: UserId,
    pub lender: UserId,
    pub initial_principal: f64,
    pub rate: f64,
    /// Zero for relationships still inside their first-month grace (they are
    /// announced anyway so the borrower sees their standing).
    pub interest: f64,
    pub total_due: f64,
}

#[derive(Clone)]
pub struct AccrualScheduler {
    ledger: Arc<Ledger>,
    sink: Arc<dyn NotificationSink>,
    audit: Arc<AuditLogger>,
}

impl AccrualScheduler {
    pub fn new(
        ledger: Arc<Ledger>,
        sink: Arc<dyn NotificationSink>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            ledger,
            sink,
            audit,
        }
    }

    /// Spawn the perpetual wake loop. The token interrupts the sleep so the
    /// process can exit cleanly.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run(cancel).await;
        })
    }

    async fn run(self, cancel: CancellationToken) {
        loop {
            let next = next_month_boundary(Local::now());
            let dur = (next - Local::now())
                .to_std()
                .unwrap_or(Duration::from_secs(0));
            println!("[ACCRUAL] Next pass at {}", next.format("%Y-%m-%d %H:%M"));

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(dur) => {
                let sent = self.reconcile(Utc::now()).await;
                println!("[ACCRUAL] Pass complete: {sent} notices delivered");
              }
            }
        }
    }

    /// One reconciliation pass over a fresh ledger snapshot.
    ///
    /// Returns the number of notices delivered. A failed delivery is reported
    /// and skipped, never aborting the remaining iterations.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> usize {
        let entries = self.ledger.relationships().await;
        let mut sent = 0usize;

        for (pair, snap) in entries {
            let interest = if accrues_interest(snap.created_at, now) {
                monthly_interest(snap.initial_principal, snap.rate)
            } else {
                0.0
            };

            let notice = AccrualNotice {
                borrower: pair.borrower,
                lender: pair.lender,
                initial_principal: snap.initial_principal,
                rate: snap.rate,
                interest,
                total_due: snap.principal + interest,
            };

            match self.sink.notify(pair.borrower, &notice).await {
                Ok(()) => {
                    sent += 1;
                    let _ = self
                        .audit
                        .write(AuditEvent::announcement(pair.borrower.0, pair.lender.0, interest));
                }
                Err(e) => {
                    eprintln!(
                        "[ACCRUAL] Failed to notify user {}: {e}",
                        pair.borrower.0
                    );
                    let _ = self
                        .audit
                        .write(AuditEvent::delivery_error(pair.borrower.0, &e.to_string()));
                }
            }
        }

        sent
    }
}

/// First instant (00:00:00) of the calendar month following `after`.
/// December rolls over to January 1 of the next year.
pub fn next_month_boundary(after: DateTime<Local>) -> DateTime<Local> {
    let (year, month) = if after.month() == 12 {
        (after.year() + 1, 1)
    } else {
        (after.year(), after.month() + 1)
    };

    Local
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .earliest()
        .unwrap_or(after + chrono::Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use chrono::Duration as ChronoDuration;
    use tokio::sync::Mutex;

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);
    const CAROL: UserId = UserId(3);

    #[derive(Default)]
    struct FakeSink {
        fail_for: Option<UserId>,
        notices: Mutex<Vec<AccrualNotice>>,
    }

    #[async_trait::async_trait]
    impl NotificationSink for FakeSink {
        async fn notify(&self, borrower: UserId, notice: &AccrualNotice) -> Result<()> {
            if self.fail_for == Some(borrower) {
                return Err(crate::Error::External("recipient unreachable".to_string()));
            }
            self.notices.lock().await.push(*notice);
            Ok(())
        }
    }

    fn test_audit() -> Arc<AuditLogger> {
        let path = format!(
            "/tmp/kashikari-sched-test-{}-{}.log",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        Arc::new(AuditLogger::new(path, true))
    }

    #[test]
    fn boundary_is_first_instant_of_next_month() {
        let mid = Local.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let next = next_month_boundary(mid);
        assert_eq!((next.year(), next.month(), next.day()), (2026, 4, 1));
        assert_eq!(next.time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn december_rolls_to_january_of_next_year() {
        let dec = Local.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        let next = next_month_boundary(dec);
        assert_eq!((next.year(), next.month(), next.day()), (2027, 1, 1));
    }

    #[test]
    fn boundary_instant_itself_maps_to_the_following_month() {
        let boundary = Local.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let next = next_month_boundary(boundary);
        assert_eq!((next.year(), next.month()), (2026, 6));
    }

    #[tokio::test]
    async fn pass_announces_every_relationship_with_recomputed_interest() {
        let ledger = Arc::new(Ledger::new());
        let backdated = Utc::now() - ChronoDuration::days(40);
        ledger
            .record_borrow_at(ALICE, BOB, 1000.0, backdated)
            .await
            .unwrap();
        ledger.assign_rate(ALICE, BOB, 10.0).await.unwrap();
        // Unset rate is tolerated.
        ledger
            .record_borrow_at(CAROL, BOB, 500.0, backdated)
            .await
            .unwrap();

        let sink = Arc::new(FakeSink::default());
        let scheduler = AccrualScheduler::new(ledger, sink.clone(), test_audit());

        let sent = scheduler.reconcile(Utc::now()).await;
        assert_eq!(sent, 2);

        let notices = sink.notices.lock().await;
        let alice = notices.iter().find(|n| n.borrower == ALICE).unwrap();
        assert_eq!(alice.interest, 100.0);
        assert_eq!(alice.total_due, 1100.0);
        let carol = notices.iter().find(|n| n.borrower == CAROL).unwrap();
        assert_eq!(carol.interest, 0.0);
        assert_eq!(carol.total_due, 500.0);
    }

    #[tokio::test]
    async fn first_month_relationships_are_announced_with_zero_interest() {
        let ledger = Arc::new(Ledger::new());
        let recent = Utc::now() - ChronoDuration::days(10);
        ledger
            .record_borrow_at(ALICE, BOB, 1000.0, recent)
            .await
            .unwrap();
        ledger.assign_rate(ALICE, BOB, 10.0).await.unwrap();

        let sink = Arc::new(FakeSink::default());
        let scheduler = AccrualScheduler::new(ledger, sink.clone(), test_audit());

        let sent = scheduler.reconcile(Utc::now()).await;
        assert_eq!(sent, 1);

        let notices = sink.notices.lock().await;
        assert_eq!(notices[0].interest, 0.0);
        assert_eq!(notices[0].total_due, 1000.0);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_abort_the_pass() {
        let ledger = Arc::new(Ledger::new());
        let backdated = Utc::now() - ChronoDuration::days(40);
        for borrower in [ALICE, CAROL] {
            ledger
                .record_borrow_at(borrower, BOB, 1000.0, backdated)
                .await
                .unwrap();
        }

        let sink = Arc::new(FakeSink {
            fail_for: Some(ALICE),
            notices: Mutex::new(Vec::new()),
        });
        let scheduler = AccrualScheduler::new(ledger, sink.clone(), test_audit());

        let sent = scheduler.reconcile(Utc::now()).await;
        assert_eq!(sent, 1);
        assert_eq!(sink.notices.lock().await[0].borrower, CAROL);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_sleep() {
        let ledger = Arc::new(Ledger::new());
        let sink = Arc::new(FakeSink::default());
        let scheduler = AccrualScheduler::new(ledger, sink, test_audit());

        let cancel = CancellationToken::new();
        let handle = scheduler.start(cancel.clone());
        cancel.cancel();
        handle.await.unwrap();
    }
}
