// Read-only access to the ledger and wallet tables

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::finance::{error::FinanceError, models::LedgerRow, period::Period};

#[async_trait]
pub trait FinanceStore: Send + Sync {
    /// Ledger rows created in the period, or all rows for `None`
    async fn transactions(&self, period: Option<&Period>) -> Result<Vec<LedgerRow>, FinanceError>;

    /// Paid wallet top-ups in the period
    async fn wallet_topup_revenue(&self, period: Option<&Period>) -> Result<Decimal, FinanceError>;

    /// Referral credits paid into customer wallets in the period
    async fn referral_payouts(&self, period: Option<&Period>) -> Result<Decimal, FinanceError>;
}

#[derive(Clone)]
pub struct PgFinanceStore {
    pool: PgPool,
}

impl PgFinanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn bounds(period: Option<&Period>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match period {
        Some(p) => (Some(p.start), Some(p.end)),
        None => (None, None),
    }
}

#[async_trait]
impl FinanceStore for PgFinanceStore {
    async fn transactions(&self, period: Option<&Period>) -> Result<Vec<LedgerRow>, FinanceError> {
        let (start, end) = bounds(period);

        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT transaction_type, amount, fees, commission, net, created_at
            FROM finance_transactions
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Loaded {} ledger row(s)", rows.len());
        Ok(rows)
    }

    async fn wallet_topup_revenue(&self, period: Option<&Period>) -> Result<Decimal, FinanceError> {
        let (start, end) = bounds(period);

        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM wallet_topups
            WHERE status = 'paid'
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn referral_payouts(&self, period: Option<&Period>) -> Result<Decimal, FinanceError> {
        let (start, end) = bounds(period);

        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM wallet_transactions
            WHERE type = 'credit'
              AND reference_type = 'referral'
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
