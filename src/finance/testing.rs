// In-memory finance store for service and handler tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::finance::{error::FinanceError, models::LedgerRow, period::Period, repository::FinanceStore};

/// Ledger row dated 2026-03-01 noon UTC
pub fn row(
    transaction_type: &str,
    amount: Option<Decimal>,
    fees: Option<Decimal>,
    net: Option<Decimal>,
) -> LedgerRow {
    row_at(
        transaction_type,
        amount,
        fees,
        net,
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    )
}

pub fn row_at(
    transaction_type: &str,
    amount: Option<Decimal>,
    fees: Option<Decimal>,
    net: Option<Decimal>,
    created_at: DateTime<Utc>,
) -> LedgerRow {
    LedgerRow {
        transaction_type: transaction_type.to_string(),
        amount,
        fees,
        commission: None,
        net,
        created_at,
    }
}

fn in_period(period: Option<&Period>, instant: DateTime<Utc>) -> bool {
    period.map_or(true, |p| p.contains(instant))
}

#[derive(Default)]
pub struct InMemoryFinanceStore {
    rows: Mutex<Vec<LedgerRow>>,
    topups: Mutex<Vec<(Decimal, DateTime<Utc>)>>,
    referral_credits: Mutex<Vec<(Decimal, DateTime<Utc>)>>,
    fail: AtomicBool,
}

impl InMemoryFinanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, row: LedgerRow) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn add_paid_topup(&self, amount: Decimal, at: DateTime<Utc>) {
        self.topups.lock().unwrap().push((amount, at));
    }

    pub fn add_referral_credit(&self, amount: Decimal, at: DateTime<Utc>) {
        self.referral_credits.lock().unwrap().push((amount, at));
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    fn guard(&self) -> Result<(), FinanceError> {
        if self.fail.load(Ordering::Relaxed) {
            Err(FinanceError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FinanceStore for InMemoryFinanceStore {
    async fn transactions(&self, period: Option<&Period>) -> Result<Vec<LedgerRow>, FinanceError> {
        self.guard()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| in_period(period, r.created_at))
            .cloned()
            .collect())
    }

    async fn wallet_topup_revenue(&self, period: Option<&Period>) -> Result<Decimal, FinanceError> {
        self.guard()?;
        Ok(self
            .topups
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, at)| in_period(period, *at))
            .map(|(amount, _)| *amount)
            .sum())
    }

    async fn referral_payouts(&self, period: Option<&Period>) -> Result<Decimal, FinanceError> {
        self.guard()?;
        Ok(self
            .referral_credits
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, at)| in_period(period, *at))
            .map(|(amount, _)| *amount)
            .sum())
    }
}
