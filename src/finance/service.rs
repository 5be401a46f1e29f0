// Finance summary service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::finance::{
    aggregator::{self, SummaryInputs},
    error::FinanceError,
    ledger::Ledger,
    models::{FinanceSummary, PeriodEcho},
    period::{self, Period, SummaryQuery},
    repository::FinanceStore,
};
use crate::metrics::ServiceMetrics;

pub struct FinanceService {
    store: Arc<dyn FinanceStore>,
    metrics: ServiceMetrics,
}

impl FinanceService {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self {
            store,
            metrics: ServiceMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Summarize the ledger for the requested period.
    ///
    /// With a range, growth compares it to the same-length period before it.
    /// Without one the summary is all-time and growth compares this month to
    /// date against the previous calendar month.
    pub async fn summary(
        &self,
        query: &SummaryQuery,
        now: DateTime<Utc>,
    ) -> Result<FinanceSummary, FinanceError> {
        let _timer = self.metrics.start_finance_summary();
        let period = period::resolve(query, now)?;

        let (growth_current, growth_previous) = match period {
            Some(p) => (p, p.previous()?),
            None => (Period::month_to_date(now), Period::previous_month(now)),
        };

        let loaded = tokio::try_join!(
            self.store.transactions(period.as_ref()),
            self.store.wallet_topup_revenue(period.as_ref()),
            self.store.referral_payouts(period.as_ref()),
            self.store.transactions(Some(&growth_previous)),
        );
        let (rows, wallet_topup_revenue, referral_payouts, previous_rows) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Failed to load finance data: {}", e);
                return Err(e);
            }
        };

        let ledger = Ledger::from_rows(rows);
        let previous_gross = aggregator::service_collected_gross(&Ledger::from_rows(previous_rows));

        let growth_current_gross = match period {
            Some(_) => aggregator::service_collected_gross(&ledger),
            None => {
                let month_rows = self.store.transactions(Some(&growth_current)).await?;
                aggregator::service_collected_gross(&Ledger::from_rows(month_rows))
            }
        };

        debug!(
            "Summarizing {} ledger row(s); growth {} vs {}",
            ledger.len(),
            growth_current_gross,
            previous_gross
        );

        Ok(aggregator::summarize(SummaryInputs {
            ledger: &ledger,
            wallet_topup_revenue,
            referral_payouts,
            growth_current_gross,
            previous_period_service_gross: previous_gross,
            period: PeriodEcho {
                start_date: period.map(|p| p.start),
                end_date: period.map(|p| p.end),
                previous_start_date: growth_previous.start,
                previous_end_date: growth_previous.end,
            },
        }))
    }
}
