// In-process pass scheduler
//
// Optional alternative to an external cron calling the execute endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::automations::engine::AutomationEngine;

/// Run a pass every `period` until the task is aborted.
///
/// Passes never overlap; a pass that outlasts the period delays the next tick.
pub fn spawn(engine: Arc<AutomationEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Automation scheduler started (every {:?})", period);

        loop {
            ticker.tick().await;
            match engine.run_pass(Utc::now()).await {
                Ok(report) if !report.errors.is_empty() => {
                    tracing::warn!(
                        "Scheduled pass finished with {} error(s)",
                        report.errors.len()
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Scheduled automation pass failed: {}", e),
            }
            engine.metrics().log_summary();
        }
    })
}
