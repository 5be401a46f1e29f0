// Automation data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::automations::error::AutomationError;

/// Trigger condition an automation listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    AppointmentReminder,
    BookingCompleted,
    NoShow,
    ClientInactive,
    Birthday,
    Rescheduled,
    NewLead,
    PackageExpiring,
    VisitMilestone,
    ClientAnniversary,
    ReferralReceived,
    SeasonalPromotion,
    Holiday,
}

impl TriggerType {
    pub const ALL: [TriggerType; 13] = [
        TriggerType::AppointmentReminder,
        TriggerType::BookingCompleted,
        TriggerType::NoShow,
        TriggerType::ClientInactive,
        TriggerType::Birthday,
        TriggerType::Rescheduled,
        TriggerType::NewLead,
        TriggerType::PackageExpiring,
        TriggerType::VisitMilestone,
        TriggerType::ClientAnniversary,
        TriggerType::ReferralReceived,
        TriggerType::SeasonalPromotion,
        TriggerType::Holiday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::AppointmentReminder => "appointment_reminder",
            TriggerType::BookingCompleted => "booking_completed",
            TriggerType::NoShow => "no_show",
            TriggerType::ClientInactive => "client_inactive",
            TriggerType::Birthday => "birthday",
            TriggerType::Rescheduled => "rescheduled",
            TriggerType::NewLead => "new_lead",
            TriggerType::PackageExpiring => "package_expiring",
            TriggerType::VisitMilestone => "visit_milestone",
            TriggerType::ClientAnniversary => "client_anniversary",
            TriggerType::ReferralReceived => "referral_received",
            TriggerType::SeasonalPromotion => "seasonal_promotion",
            TriggerType::Holiday => "holiday",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AutomationError::UnknownType {
                kind: "trigger type",
                value: s.to_string(),
            })
    }
}

/// Delivery channel configured on the automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Email,
    Sms,
    Whatsapp,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Email => "email",
            ActionType::Sms => "sms",
            ActionType::Whatsapp => "whatsapp",
        }
    }

    /// Contact channel tried first when resolving a recipient
    pub fn preferred_contact(&self) -> ContactChannel {
        match self {
            ActionType::Email => ContactChannel::Email,
            ActionType::Sms | ActionType::Whatsapp => ContactChannel::Phone,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ActionType::Email),
            "sms" => Ok(ActionType::Sms),
            "whatsapp" => Ok(ActionType::Whatsapp),
            other => Err(AutomationError::UnknownType {
                kind: "action type",
                value: other.to_string(),
            }),
        }
    }
}

/// Provider-scoped marketing rule, as stored.
///
/// Trigger and action types are kept as raw strings so one malformed row
/// surfaces as an error for that automation instead of failing the whole load.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Automation {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub trigger_type: String,
    pub trigger_config: serde_json::Value,
    pub delay_minutes: i32,
    pub action_type: String,
    pub action_config: serde_json::Value,
    pub is_active: bool,
}

impl Automation {
    pub fn trigger(&self) -> Result<TriggerType, AutomationError> {
        self.trigger_type.parse()
    }

    pub fn action(&self) -> Result<ActionType, AutomationError> {
        self.action_type.parse()
    }

    /// Message settings; unknown keys are ignored and a malformed object falls back to defaults
    pub fn action_settings(&self) -> ActionConfig {
        serde_json::from_value(self.action_config.clone()).unwrap_or_default()
    }
}

/// Message settings from `action_config`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ActionConfig {
    #[serde(alias = "template", alias = "message")]
    pub message_template: Option<String>,
    pub subject: Option<String>,
    #[serde(alias = "from_name")]
    pub sender_name: Option<String>,
}

/// Booking matched by a trigger
#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct BookingMatch {
    pub booking_id: Uuid,
    pub booking_number: String,
    pub customer_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

/// Client matched by a trigger that has no more specific entity
#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct ClientMatch {
    pub customer_id: Uuid,
}

/// Prepaid package matched by the expiry trigger
#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct PackageMatch {
    pub package_id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub expires_at: DateTime<Utc>,
}

/// Referral matched by the referral trigger; `customer_id` is the referrer
#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct ReferralMatch {
    pub referral_id: Uuid,
    pub customer_id: Uuid,
    pub referred_customer_id: Option<Uuid>,
}

/// Entity that caused a trigger to fire, used for personalization
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextEntity {
    Booking(BookingMatch),
    Client(ClientMatch),
    Package(PackageMatch),
    Referral(ReferralMatch),
}

impl ContextEntity {
    pub fn customer_id(&self) -> Uuid {
        match self {
            ContextEntity::Booking(b) => b.customer_id,
            ContextEntity::Client(c) => c.customer_id,
            ContextEntity::Package(p) => p.customer_id,
            ContextEntity::Referral(r) => r.customer_id,
        }
    }

    /// Stable reference stored alongside the execution record
    pub fn reference(&self) -> Option<String> {
        match self {
            ContextEntity::Booking(b) => Some(format!("booking:{}", b.booking_id)),
            ContextEntity::Client(_) => None,
            ContextEntity::Package(p) => Some(format!("package:{}", p.package_id)),
            ContextEntity::Referral(r) => Some(format!("referral:{}", r.referral_id)),
        }
    }
}

/// Contact details from the customer directory
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct CustomerContact {
    pub customer_id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Phone,
    Email,
}

/// Resolved message recipient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipient {
    pub customer_id: Uuid,
    pub destination: String,
    pub channel: ContactChannel,
    pub name: Option<String>,
}

/// Append-only record that an automation fired for a customer
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub automation_id: Uuid,
    pub customer_id: Uuid,
    pub action_type: String,
    pub message_id: Option<String>,
    pub context_ref: Option<String>,
    pub executed_at: DateTime<Utc>,
}
