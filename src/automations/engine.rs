// Automation pass orchestration
//
// A pass loads every active automation and evaluates each one independently.
// Per-automation and per-recipient failures are folded into the report; only
// failing to load the automation list aborts the pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::automations::{
    dispatch::{DispatchReceipt, MessageDispatcher, OutboundMessage},
    error::{AutomationError, DispatchError},
    models::{ActionConfig, ActionType, Automation, ContactChannel, ContextEntity, Recipient},
    recipients::{distinct_customers, resolve_recipients},
    repository::{AutomationStore, ClaimOutcome, ExecutionLog, NewExecution},
    template::{context_for, render_message, RenderedMessage},
    triggers::TriggerRegistry,
    window::TriggerWindow,
};
use crate::metrics::ServiceMetrics;

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Error attributed to one automation during a pass
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PassError {
    pub automation_id: Uuid,
    pub error: String,
}

/// Result of one pass over all active automations
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// Automations that delivered at least one message
    pub executed: usize,
    pub automation_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PassError>,
    pub messages_sent: usize,
    pub duplicates_skipped: usize,
}

/// What one automation contributed to a pass
#[derive(Debug, Default)]
struct AutomationOutcome {
    automation_id: Uuid,
    sent: usize,
    duplicates: usize,
    errors: Vec<String>,
}

impl PassReport {
    fn absorb(mut self, outcome: AutomationOutcome) -> Self {
        if outcome.sent > 0 {
            self.executed += 1;
            self.automation_ids.push(outcome.automation_id);
        }
        self.messages_sent += outcome.sent;
        self.duplicates_skipped += outcome.duplicates;
        self.errors.extend(outcome.errors.into_iter().map(|error| PassError {
            automation_id: outcome.automation_id,
            error,
        }));
        self
    }
}

/// Message that would be sent to one recipient
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreviewMessage {
    pub customer_id: Uuid,
    pub channel: ContactChannel,
    pub destination: String,
    #[serde(flatten)]
    pub message: RenderedMessage,
}

/// Dry-run evaluation of one automation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AutomationPreview {
    pub automation_id: Uuid,
    pub trigger_type: String,
    pub is_active: bool,
    pub fire: bool,
    pub window: TriggerWindow,
    pub matched: usize,
    pub messages: Vec<PreviewMessage>,
}

pub struct AutomationEngine {
    store: Arc<dyn AutomationStore>,
    executions: Arc<dyn ExecutionLog>,
    dispatcher: Arc<dyn MessageDispatcher>,
    registry: Arc<TriggerRegistry>,
    metrics: ServiceMetrics,
    dispatch_timeout: Duration,
    concurrency: usize,
}

impl AutomationEngine {
    pub fn new(
        store: Arc<dyn AutomationStore>,
        executions: Arc<dyn ExecutionLog>,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> Self {
        Self {
            store,
            executions,
            dispatcher,
            registry: Arc::new(TriggerRegistry::with_defaults()),
            metrics: ServiceMetrics::new(),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_registry(mut self, registry: TriggerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Automations evaluated at once; clamped to at least one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn executions(&self) -> &Arc<dyn ExecutionLog> {
        &self.executions
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Run one pass over every active automation
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassReport, AutomationError> {
        let _timer = self.metrics.start_pass();

        let automations = match self.store.active_automations().await {
            Ok(automations) => automations,
            Err(e) => {
                error!("Failed to load active automations: {}", e);
                self.metrics.record_failed_pass();
                return Err(e);
            }
        };

        debug!("Evaluating {} active automation(s) at {}", automations.len(), now);

        let report = stream::iter(automations)
            .map(|automation| async move { self.run_automation(&automation, now).await })
            .buffered(self.concurrency)
            .fold(PassReport::default(), |report, outcome| async move {
                report.absorb(outcome)
            })
            .await;

        info!(
            "Automation pass complete: {} executed, {} sent, {} duplicate(s) skipped, {} error(s)",
            report.executed,
            report.messages_sent,
            report.duplicates_skipped,
            report.errors.len()
        );

        Ok(report)
    }

    async fn run_automation(&self, automation: &Automation, now: DateTime<Utc>) -> AutomationOutcome {
        let mut outcome = AutomationOutcome {
            automation_id: automation.id,
            ..AutomationOutcome::default()
        };

        if let Err(e) = self.evaluate_and_deliver(automation, now, &mut outcome).await {
            warn!("Automation {} ({}) failed: {}", automation.id, automation.name, e);
            self.metrics.record_automation_error();
            outcome.errors.push(e.to_string());
        }

        if outcome.sent > 0 {
            self.metrics.record_automation_fired();
        }

        outcome
    }

    async fn evaluate_and_deliver(
        &self,
        automation: &Automation,
        now: DateTime<Utc>,
        outcome: &mut AutomationOutcome,
    ) -> Result<(), AutomationError> {
        let action = automation.action()?;
        let evaluation = self
            .registry
            .should_fire(self.store.as_ref(), automation, now)
            .await?;

        if !evaluation.fire {
            return Ok(());
        }

        let recipients = self.recipients_for(action, &evaluation.context).await?;
        let config = automation.action_settings();

        for recipient in &recipients {
            self.deliver(automation, action, &config, recipient, &evaluation.context, now, outcome)
                .await;
        }

        Ok(())
    }

    async fn recipients_for(
        &self,
        action: ActionType,
        context: &[ContextEntity],
    ) -> Result<Vec<Recipient>, AutomationError> {
        let customer_ids = distinct_customers(context);
        let contacts = self.store.customer_contacts(&customer_ids).await?;
        Ok(resolve_recipients(action, context, &contacts))
    }

    /// Claim, send and confirm one message. Execution log failures are
    /// logged and the send goes ahead without a record.
    #[allow(clippy::too_many_arguments)]
    async fn deliver(
        &self,
        automation: &Automation,
        action: ActionType,
        config: &ActionConfig,
        recipient: &Recipient,
        context: &[ContextEntity],
        now: DateTime<Utc>,
        outcome: &mut AutomationOutcome,
    ) {
        let execution = NewExecution {
            automation_id: automation.id,
            customer_id: recipient.customer_id,
            action_type: action,
            context_ref: context_for(recipient, context).and_then(ContextEntity::reference),
            executed_at: now,
        };

        let claim = match self.executions.claim(&execution).await {
            Ok(ClaimOutcome::Claimed(id)) => Some(id),
            Ok(ClaimOutcome::Duplicate) => {
                debug!(
                    "Automation {} already sent to customer {} in the last 24h",
                    automation.id, recipient.customer_id
                );
                self.metrics.record_duplicate_skipped();
                outcome.duplicates += 1;
                return;
            }
            Err(e) => {
                warn!(
                    "Execution log unavailable for automation {}, sending without a record: {}",
                    automation.id, e
                );
                None
            }
        };

        let rendered = render_message(automation, action, config, recipient, context);
        let message = OutboundMessage {
            provider_id: automation.provider_id,
            action,
            contact_channel: recipient.channel,
            destination: recipient.destination.clone(),
            subject: rendered.subject,
            body: rendered.body,
            sender_name: config.sender_name.clone(),
        };

        match self.send_with_timeout(&message).await {
            Ok(receipt) => {
                outcome.sent += 1;
                self.metrics.record_message_sent();
                if let Some(id) = claim {
                    if let Err(e) = self.executions.confirm(id, receipt.message_id.as_deref()).await {
                        warn!("Failed to record message id for execution {}: {}", id, e);
                    }
                }
            }
            Err(e) => {
                warn!(
                    "Dispatch failed for automation {} to customer {}: {}",
                    automation.id, recipient.customer_id, e
                );
                self.metrics.record_dispatch_failure();
                outcome
                    .errors
                    .push(format!("customer {}: {}", recipient.customer_id, e));
                if let Some(id) = claim {
                    if let Err(e) = self.executions.release(id).await {
                        warn!("Failed to release execution claim {}: {}", id, e);
                    }
                }
            }
        }
    }

    async fn send_with_timeout(
        &self,
        message: &OutboundMessage,
    ) -> Result<DispatchReceipt, DispatchError> {
        let _timer = self.metrics.start_dispatch();
        tokio::time::timeout(self.dispatch_timeout, self.dispatcher.send(message))
            .await
            .map_err(|_| DispatchError::Timeout(self.dispatch_timeout))?
    }

    /// Evaluate one automation at `now` and render its messages without sending
    pub async fn preview(
        &self,
        automation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AutomationPreview, AutomationError> {
        let automation = self
            .store
            .find_automation(automation_id)
            .await?
            .ok_or(AutomationError::NotFound(automation_id))?;

        let action = automation.action()?;
        let evaluation = self
            .registry
            .should_fire(self.store.as_ref(), &automation, now)
            .await?;

        let recipients = if evaluation.fire {
            self.recipients_for(action, &evaluation.context).await?
        } else {
            Vec::new()
        };

        let config = automation.action_settings();
        let messages = recipients
            .iter()
            .map(|recipient| PreviewMessage {
                customer_id: recipient.customer_id,
                channel: recipient.channel,
                destination: recipient.destination.clone(),
                message: render_message(&automation, action, &config, recipient, &evaluation.context),
            })
            .collect();

        Ok(AutomationPreview {
            automation_id,
            trigger_type: automation.trigger_type.clone(),
            is_active: automation.is_active,
            fire: evaluation.fire,
            window: evaluation.window,
            matched: evaluation.context.len(),
            messages,
        })
    }
}
