//! The ledger store: who owes whom, how much, at what rate.
//!
//! All state lives behind a single async mutex; every operation is one brief
//! critical section and mutations are atomic per relationship. Failed
//! validation never touches the map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    accrual::{accrues_interest, monthly_interest},
    domain::{DebtPair, UserId},
    errors::Error,
    Result,
};

/// One debt relationship, owned exclusively by the [`Ledger`].
#[derive(Clone, Copy, Debug)]
struct DebtRelationship {
    principal: f64,
    /// Captured at first borrow; the fixed interest base for the
    /// relationship's lifetime.
    initial_principal: f64,
    rate: f64,
    accrued_interest: f64,
    created_at: DateTime<Utc>,
}

impl DebtRelationship {
    fn snapshot(&self) -> DebtSnapshot {
        DebtSnapshot {
            principal: self.principal,
            initial_principal: self.initial_principal,
            rate: self.rate,
            accrued_interest: self.accrued_interest,
            created_at: self.created_at,
        }
    }
}

/// Read-only copy of a relationship's state, for rendering and for the
/// monthly reconciliation pass.
#[derive(Clone, Copy, Debug)]
pub struct DebtSnapshot {
    pub principal: f64,
    pub initial_principal: f64,
    pub rate: f64,
    pub accrued_interest: f64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a repayment.
#[derive(Clone, Copy, Debug)]
pub enum ReturnOutcome {
    /// The repayment covered (or exceeded) the outstanding principal; the
    /// relationship and its derived rate/interest are gone.
    Settled,
    Outstanding(DebtSnapshot),
}

/// Result of a rate assignment.
#[derive(Clone, Copy, Debug)]
pub struct InterestQuote {
    pub rate: f64,
    pub interest: f64,
}

/// Per-borrower aggregation across lenders.
#[derive(Clone, Debug)]
pub struct TotalsReport {
    pub total_principal: f64,
    /// Sum of accrued interest over lenders, counting only relationships past
    /// their first-month grace at the query instant.
    pub total_interest: f64,
    pub lenders: Vec<LenderLine>,
}

#[derive(Clone, Copy, Debug)]
pub struct LenderLine {
    pub lender: UserId,
    pub principal: f64,
    /// Zero while the relationship is inside its first-month grace.
    pub interest: f64,
}

/// In-memory debt ledger. State is ephemeral and process-lifetime only.
#[derive(Default)]
pub struct Ledger {
    relationships: Mutex<HashMap<DebtPair, DebtRelationship>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a borrow, creating the relationship on first contact between
    /// the pair. `initial_principal` is set exactly once, at creation.
    pub async fn record_borrow(
        &self,
        borrower: UserId,
        lender: UserId,
        amount: f64,
    ) -> Result<DebtSnapshot> {
        self.record_borrow_at(borrower, lender, amount, Utc::now())
            .await
    }

    /// Clock-injected variant so tests can backdate `created_at`.
    pub(crate) async fn record_borrow_at(
        &self,
        borrower: UserId,
        lender: UserId,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Result<DebtSnapshot> {
        if borrower == lender {
            return Err(Error::InvalidOperation(
                "cannot borrow from yourself".to_string(),
            ));
        }
        check_amount(amount)?;

        let mut map = self.relationships.lock().await;
        let entry = map
            .entry(DebtPair { borrower, lender })
            .or_insert_with(|| DebtRelationship {
                principal: 0.0,
                initial_principal: amount,
                rate: 0.0,
                accrued_interest: 0.0,
                created_at: now,
            });
        entry.principal += amount;
        Ok(entry.snapshot())
    }

    /// Record a repayment. Driving the principal to zero or below deletes the
    /// relationship entirely.
    pub async fn record_return(
        &self,
        borrower: UserId,
        lender: UserId,
        amount: f64,
    ) -> Result<ReturnOutcome> {
        check_amount(amount)?;

        let mut map = self.relationships.lock().await;
        let pair = DebtPair { borrower, lender };
        let Some(rel) = map.get_mut(&pair) else {
            return Err(Error::NoSuchDebt { borrower, lender });
        };

        rel.principal -= amount;
        if rel.principal <= 0.0 {
            map.remove(&pair);
            return Ok(ReturnOutcome::Settled);
        }
        Ok(ReturnOutcome::Outstanding(rel.snapshot()))
    }

    /// Assign the interest rate for a pair and recompute the accrued interest
    /// from the initial principal.
    pub async fn assign_rate(
        &self,
        borrower: UserId,
        lender: UserId,
        rate: f64,
    ) -> Result<InterestQuote> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::InvalidOperation(format!(
                "rate must be a non-negative percentage, got {rate}"
            )));
        }

        let mut map = self.relationships.lock().await;
        let Some(rel) = map.get_mut(&DebtPair { borrower, lender }) else {
            return Err(Error::NoSuchDebt { borrower, lender });
        };

        rel.rate = rate;
        rel.accrued_interest = monthly_interest(rel.initial_principal, rate);
        Ok(InterestQuote {
            rate,
            interest: rel.accrued_interest,
        })
    }

    /// Aggregate a borrower's standing across all lenders.
    ///
    /// `None` means the borrower has no relationships, which is a normal
    /// state and not an error.
    pub async fn totals_for(&self, borrower: UserId, now: DateTime<Utc>) -> Option<TotalsReport> {
        let map = self.relationships.lock().await;

        let mut lenders: Vec<LenderLine> = map
            .iter()
            .filter(|(pair, _)| pair.borrower == borrower)
            .map(|(pair, rel)| LenderLine {
                lender: pair.lender,
                principal: rel.principal,
                interest: if accrues_interest(rel.created_at, now) {
                    rel.accrued_interest
                } else {
                    0.0
                },
            })
            .collect();

        if lenders.is_empty() {
            return None;
        }
        lenders.sort_by_key(|l| l.lender);

        Some(TotalsReport {
            total_principal: lenders.iter().map(|l| l.principal).sum(),
            total_interest: lenders.iter().map(|l| l.interest).sum(),
            lenders,
        })
    }

    /// One-pass snapshot of every relationship, taken under the lock.
    ///
    /// The monthly scheduler consumes a fresh snapshot each wake; the lock is
    /// not held across notification I/O, so mutations committed mid-pass are
    /// not reflected in in-flight notices.
    pub async fn relationships(&self) -> Vec<(DebtPair, DebtSnapshot)> {
        let map = self.relationships.lock().await;
        map.iter().map(|(p, r)| (*p, r.snapshot())).collect()
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidOperation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);
    const CAROL: UserId = UserId(3);

    #[tokio::test]
    async fn borrows_sum_into_principal_but_not_initial() {
        let ledger = Ledger::new();

        let snap = ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        assert_eq!(snap.principal, 1000.0);
        assert_eq!(snap.initial_principal, 1000.0);

        let snap = ledger.record_borrow(ALICE, BOB, 500.0).await.unwrap();
        assert_eq!(snap.principal, 1500.0);
        assert_eq!(snap.initial_principal, 1000.0);

        let snap = ledger.record_borrow(ALICE, BOB, 250.0).await.unwrap();
        assert_eq!(snap.principal, 1750.0);
        assert_eq!(snap.initial_principal, 1000.0);
    }

    #[tokio::test]
    async fn self_borrow_is_rejected_and_creates_nothing() {
        let ledger = Ledger::new();
        let err = ledger.record_borrow(ALICE, ALICE, 100.0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert!(ledger.relationships().await.is_empty());
    }

    #[tokio::test]
    async fn non_positive_or_non_finite_amounts_leave_state_untouched() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        let before = ledger.relationships().await;

        for bad in [0.0, -50.0, f64::NAN, f64::INFINITY] {
            let err = ledger.record_borrow(ALICE, BOB, bad).await.unwrap_err();
            assert!(matches!(err, Error::InvalidOperation(_)));
            let err = ledger.record_return(ALICE, BOB, bad).await.unwrap_err();
            assert!(matches!(err, Error::InvalidOperation(_)));
        }

        let after = ledger.relationships().await;
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].1.principal, after[0].1.principal);
        assert_eq!(before[0].1.initial_principal, after[0].1.initial_principal);
    }

    #[tokio::test]
    async fn return_on_missing_pair_is_no_such_debt_and_a_noop() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();

        let err = ledger.record_return(ALICE, CAROL, 100.0).await.unwrap_err();
        assert!(matches!(err, Error::NoSuchDebt { .. }));

        let entries = ledger.relationships().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.principal, 1000.0);
    }

    #[tokio::test]
    async fn overpaying_deletes_the_relationship() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();

        let outcome = ledger.record_return(ALICE, BOB, 1500.0).await.unwrap();
        assert!(matches!(outcome, ReturnOutcome::Settled));
        assert!(ledger.totals_for(ALICE, Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn partial_return_reports_remaining_principal() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();

        let outcome = ledger.record_return(ALICE, BOB, 300.0).await.unwrap();
        match outcome {
            ReturnOutcome::Outstanding(snap) => {
                assert_eq!(snap.principal, 700.0);
                assert_eq!(snap.initial_principal, 1000.0);
            }
            ReturnOutcome::Settled => panic!("should still be outstanding"),
        }
    }

    #[tokio::test]
    async fn rate_assignment_uses_initial_principal_not_current() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        ledger.record_borrow(ALICE, BOB, 500.0).await.unwrap();

        // 10% of the initial 1000, not of the current 1500.
        let quote = ledger.assign_rate(ALICE, BOB, 10.0).await.unwrap();
        assert_eq!(quote.interest, 100.0);
    }

    #[tokio::test]
    async fn negative_rate_is_rejected_without_mutation() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        ledger.assign_rate(ALICE, BOB, 5.0).await.unwrap();

        let err = ledger.assign_rate(ALICE, BOB, -1.0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        let entries = ledger.relationships().await;
        assert_eq!(entries[0].1.rate, 5.0);
        assert_eq!(entries[0].1.accrued_interest, 50.0);
    }

    #[tokio::test]
    async fn rate_on_missing_pair_is_no_such_debt() {
        let ledger = Ledger::new();
        let err = ledger.assign_rate(ALICE, BOB, 5.0).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NoSuchDebt {
                borrower: ALICE,
                lender: BOB
            }
        ));
    }

    #[tokio::test]
    async fn borrow_and_return_never_touch_accrued_interest() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        ledger.assign_rate(ALICE, BOB, 5.0).await.unwrap();

        ledger.record_borrow(ALICE, BOB, 400.0).await.unwrap();
        ledger.record_return(ALICE, BOB, 200.0).await.unwrap();

        let entries = ledger.relationships().await;
        assert_eq!(entries[0].1.accrued_interest, 50.0);
    }

    #[tokio::test]
    async fn totals_aggregate_across_lenders() {
        let ledger = Ledger::new();
        let backdated = Utc::now() - Duration::days(40);
        ledger
            .record_borrow_at(ALICE, BOB, 1000.0, backdated)
            .await
            .unwrap();
        ledger
            .record_borrow_at(ALICE, CAROL, 2000.0, backdated)
            .await
            .unwrap();
        ledger.assign_rate(ALICE, BOB, 10.0).await.unwrap();
        ledger.assign_rate(ALICE, CAROL, 5.0).await.unwrap();

        let report = ledger.totals_for(ALICE, Utc::now()).await.unwrap();
        assert_eq!(report.total_principal, 3000.0);
        assert_eq!(report.total_interest, 200.0);
        assert_eq!(report.lenders.len(), 2);
        assert_eq!(report.lenders[0].lender, BOB);
        assert_eq!(report.lenders[1].lender, CAROL);
    }

    #[tokio::test]
    async fn totals_suppress_interest_during_first_month() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        ledger.assign_rate(ALICE, BOB, 10.0).await.unwrap();

        // The relationship is brand new, so its interest is filtered out,
        // while the stored figure is untouched.
        let report = ledger.totals_for(ALICE, Utc::now()).await.unwrap();
        assert_eq!(report.total_interest, 0.0);
        assert_eq!(ledger.relationships().await[0].1.accrued_interest, 100.0);
    }

    #[tokio::test]
    async fn totals_only_cover_the_requested_borrower() {
        let ledger = Ledger::new();
        ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        ledger.record_borrow(CAROL, BOB, 500.0).await.unwrap();

        let report = ledger.totals_for(ALICE, Utc::now()).await.unwrap();
        assert_eq!(report.total_principal, 1000.0);
        assert!(ledger.totals_for(BOB, Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn full_scenario_from_borrow_to_settlement() {
        let ledger = Ledger::new();

        let snap = ledger.record_borrow(ALICE, BOB, 1000.0).await.unwrap();
        assert_eq!((snap.principal, snap.initial_principal), (1000.0, 1000.0));

        let snap = ledger.record_borrow(ALICE, BOB, 500.0).await.unwrap();
        assert_eq!((snap.principal, snap.initial_principal), (1500.0, 1000.0));

        let quote = ledger.assign_rate(ALICE, BOB, 5.0).await.unwrap();
        assert_eq!(quote.interest, 50.0);

        let outcome = ledger.record_return(ALICE, BOB, 1600.0).await.unwrap();
        assert!(matches!(outcome, ReturnOutcome::Settled));
        assert!(ledger.totals_for(ALICE, Utc::now()).await.is_none());
    }
}
