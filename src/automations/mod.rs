// Automation Trigger Engine
//
// Evaluates provider-configured marketing automations against booking and
// client state, resolves recipients, renders templated messages and dispatches
// each one at most once per (automation, customer) per trailing 24 hours.
//
// A pass is stateless: an external scheduler (or the optional in-process
// scheduler) calls `AutomationEngine::run_pass` every few minutes, and each
// trigger matches entities inside a short window sized to that interval.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod recipients;
pub mod repository;
pub mod scheduler;
pub mod template;
pub mod triggers;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;


pub use dispatch::{DispatchReceipt, HttpDispatcher, LogDispatcher, MessageDispatcher, OutboundMessage};
pub use engine::{AutomationEngine, AutomationPreview, PassError, PassReport};
pub use error::{AutomationError, DispatchError};
pub use models::{
    ActionConfig, ActionType, Automation, ContactChannel, ContextEntity, CustomerContact,
    ExecutionRecord, Recipient, TriggerType,
};
pub use repository::{AutomationStore, ClaimOutcome, ExecutionLog, NewExecution, PgAutomationStore};
pub use triggers::{EvaluationResult, TriggerEvaluator, TriggerRegistry};
pub use window::TriggerWindow;
