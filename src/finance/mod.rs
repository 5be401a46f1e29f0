// Finance Ledger Aggregator
//
// Reduces the immutable transaction ledger into a revenue summary for a
// period: service gross and fees, platform commission net of refunds,
// subscription and ads revenue, wallet top-ups and referral payouts, plus
// period-over-period growth of gross services collected.
//
// Every ledger figure is composed from one reducer (`Ledger::sum`) over a
// single in-memory row set, so all figures in a summary agree with each other.

pub mod aggregator;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod period;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use error::FinanceError;
pub use ledger::Ledger;
pub use models::{FinanceSummary, LedgerField, LedgerRow, PeriodEcho, TransactionType, TypeBreakdown};
pub use period::{Period, SummaryQuery};
pub use repository::{FinanceStore, PgFinanceStore};
pub use service::FinanceService;
