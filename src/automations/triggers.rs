// Trigger evaluation
//
// Each trigger type has an evaluator registered under its `TriggerType`.
// An evaluator computes the target instant T from `now`, the trigger config
// and the automation delay, builds the window [T - W, T] and asks the store
// for the entities whose relevant timestamp falls inside it.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;
use utoipa::ToSchema;

use crate::automations::{
    error::AutomationError,
    models::{Automation, ContextEntity, TriggerType},
    repository::{AutomationStore, BookingQuery, BookingStatus, BookingTimestamp},
    window::{month_days_observed_on, TriggerWindow, DEFAULT_WINDOW_MINUTES, INACTIVE_WINDOW_MINUTES},
};

/// Default UTC hour for day-level triggers
const DEFAULT_SEND_HOUR: i64 = 9;

/// Upper bound for numeric trigger settings, keeping date arithmetic in range
const MAX_CONFIG_NUMBER: i64 = 100_000;

/// Outcome of evaluating one automation at one instant
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EvaluationResult {
    pub fire: bool,
    pub window: TriggerWindow,
    #[schema(value_type = Vec<Object>)]
    pub context: Vec<ContextEntity>,
}

impl EvaluationResult {
    fn from_context(window: TriggerWindow, context: Vec<ContextEntity>) -> Self {
        Self {
            fire: !context.is_empty(),
            window,
            context,
        }
    }
}

#[async_trait]
pub trait TriggerEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError>;
}

/// Evaluators keyed by trigger type
pub struct TriggerRegistry {
    evaluators: HashMap<TriggerType, Box<dyn TriggerEvaluator>>,
}

impl TriggerRegistry {
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    pub fn register(&mut self, trigger: TriggerType, evaluator: impl TriggerEvaluator + 'static) {
        self.evaluators.insert(trigger, Box::new(evaluator));
    }

    /// Registry with an evaluator for every trigger type
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register(
            TriggerType::AppointmentReminder,
            BookingTrigger {
                offset: Offset::ahead("hours_before", OffsetUnit::Hours, 24),
                timestamp: BookingTimestamp::ScheduledAt,
                statuses: &[BookingStatus::Pending, BookingStatus::Confirmed],
            },
        );
        registry.register(
            TriggerType::BookingCompleted,
            BookingTrigger {
                offset: Offset::behind("hours_after", OffsetUnit::Hours, 0),
                timestamp: BookingTimestamp::CompletedAt,
                statuses: &[BookingStatus::Completed],
            },
        );
        registry.register(
            TriggerType::NoShow,
            BookingTrigger {
                offset: Offset::behind("hours_after", OffsetUnit::Hours, 0),
                timestamp: BookingTimestamp::UpdatedAt,
                statuses: &[BookingStatus::NoShow],
            },
        );
        registry.register(
            TriggerType::Rescheduled,
            BookingTrigger {
                offset: Offset::behind("minutes_after", OffsetUnit::Minutes, 0),
                timestamp: BookingTimestamp::RescheduledAt,
                statuses: &[],
            },
        );
        registry.register(TriggerType::ClientInactive, ClientInactiveTrigger);
        registry.register(TriggerType::Birthday, BirthdayTrigger);
        registry.register(TriggerType::NewLead, NewLeadTrigger);
        registry.register(TriggerType::PackageExpiring, PackageExpiringTrigger);
        registry.register(TriggerType::VisitMilestone, VisitMilestoneTrigger);
        registry.register(TriggerType::ClientAnniversary, ClientAnniversaryTrigger);
        registry.register(TriggerType::ReferralReceived, ReferralTrigger);
        registry.register(TriggerType::SeasonalPromotion, SeasonalPromotionTrigger);
        registry.register(TriggerType::Holiday, HolidayTrigger);

        registry
    }

    pub fn is_registered(&self, trigger: TriggerType) -> bool {
        self.evaluators.contains_key(&trigger)
    }

    /// Evaluate an automation's trigger at `now`
    pub async fn should_fire(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let trigger = automation.trigger()?;
        let evaluator = self
            .evaluators
            .get(&trigger)
            .ok_or_else(|| AutomationError::UnregisteredTrigger(trigger.to_string()))?;

        let result = evaluator.evaluate(store, automation, now).await?;

        debug!(
            "Automation {} ({}) window {}..{}: {} match(es)",
            automation.id,
            trigger,
            result.window.start,
            result.window.end,
            result.context.len()
        );

        Ok(result)
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn invalid_config(automation: &Automation, reason: impl Into<String>) -> AutomationError {
    AutomationError::InvalidTriggerConfig {
        automation_id: automation.id,
        reason: reason.into(),
    }
}

/// Non-negative integer from `trigger_config[key]`, accepting numeric strings
fn config_number(automation: &Automation, key: &str, default: i64) -> Result<i64, AutomationError> {
    let value = match automation.trigger_config.get(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    match value {
        Some(n) if (0..=MAX_CONFIG_NUMBER).contains(&n) => Ok(n),
        Some(n) if n > MAX_CONFIG_NUMBER => Err(invalid_config(
            automation,
            format!("{} must be at most {} (got {})", key, MAX_CONFIG_NUMBER, n),
        )),
        Some(n) => Err(invalid_config(automation, format!("{} must not be negative (got {})", key, n))),
        None => Err(invalid_config(automation, format!("{} must be a whole number", key))),
    }
}

fn required_number(automation: &Automation, key: &str) -> Result<i64, AutomationError> {
    if automation.trigger_config.get(key).map_or(true, Value::is_null) {
        return Err(invalid_config(automation, format!("{} is required", key)));
    }
    config_number(automation, key, 0)
}

fn send_hour(automation: &Automation) -> Result<u32, AutomationError> {
    let hour = config_number(automation, "send_hour", DEFAULT_SEND_HOUR)?;
    if hour > 23 {
        return Err(invalid_config(automation, format!("send_hour must be 0-23 (got {})", hour)));
    }
    Ok(hour as u32)
}

fn delay(automation: &Automation) -> Result<Duration, AutomationError> {
    if automation.delay_minutes < 0 {
        return Err(invalid_config(
            automation,
            format!("delay_minutes must not be negative (got {})", automation.delay_minutes),
        ));
    }
    Ok(Duration::minutes(i64::from(automation.delay_minutes)))
}

/// `now - delay`, for triggers without a configurable offset
fn delayed_target(automation: &Automation, now: DateTime<Utc>) -> Result<DateTime<Utc>, AutomationError> {
    Ok(now - delay(automation)?)
}

fn default_window(target: DateTime<Utc>) -> TriggerWindow {
    TriggerWindow::ending_at(target, Duration::minutes(DEFAULT_WINDOW_MINUTES))
}

#[derive(Debug, Clone, Copy)]
enum OffsetUnit {
    Minutes,
    Hours,
    Days,
}

impl OffsetUnit {
    fn duration(&self, amount: i64) -> Duration {
        match self {
            OffsetUnit::Minutes => Duration::minutes(amount),
            OffsetUnit::Hours => Duration::hours(amount),
            OffsetUnit::Days => Duration::days(amount),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    /// Event lies in the future (reminders, expiries)
    Ahead,
    /// Event lies in the past (follow-ups)
    Behind,
}

/// Configurable distance between `now` and the event being matched
#[derive(Debug, Clone, Copy)]
struct Offset {
    key: &'static str,
    unit: OffsetUnit,
    default: i64,
    direction: Direction,
}

impl Offset {
    const fn ahead(key: &'static str, unit: OffsetUnit, default: i64) -> Self {
        Self {
            key,
            unit,
            default,
            direction: Direction::Ahead,
        }
    }

    const fn behind(key: &'static str, unit: OffsetUnit, default: i64) -> Self {
        Self {
            key,
            unit,
            default,
            direction: Direction::Behind,
        }
    }

    /// Target instant T, with the automation delay shifting T back
    fn target(&self, automation: &Automation, now: DateTime<Utc>) -> Result<DateTime<Utc>, AutomationError> {
        let amount = config_number(automation, self.key, self.default)?;
        let offset = self.unit.duration(amount);
        let delay = delay(automation)?;

        Ok(match self.direction {
            Direction::Ahead => now + offset - delay,
            Direction::Behind => now - offset - delay,
        })
    }
}

/// Bookings whose `timestamp` falls in the window
struct BookingTrigger {
    offset: Offset,
    timestamp: BookingTimestamp,
    statuses: &'static [BookingStatus],
}

#[async_trait]
impl TriggerEvaluator for BookingTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let window = default_window(self.offset.target(automation, now)?);
        let query = BookingQuery {
            timestamp: self.timestamp,
            statuses: self.statuses,
            window,
        };

        let bookings = store.bookings_in_window(automation.provider_id, &query).await?;
        let context = bookings.into_iter().map(ContextEntity::Booking).collect();

        Ok(EvaluationResult::from_context(window, context))
    }
}

struct ClientInactiveTrigger;

#[async_trait]
impl TriggerEvaluator for ClientInactiveTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let target = Offset::behind("days", OffsetUnit::Days, 30).target(automation, now)?;
        let window = TriggerWindow::ending_at(target, Duration::minutes(INACTIVE_WINDOW_MINUTES));

        let clients = store.inactive_clients(automation.provider_id, &window).await?;
        let context = clients.into_iter().map(ContextEntity::Client).collect();

        Ok(EvaluationResult::from_context(window, context))
    }
}

struct BirthdayTrigger;

#[async_trait]
impl TriggerEvaluator for BirthdayTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let target = Offset::ahead("days_before", OffsetUnit::Days, 0).target(automation, now)?;
        let window = default_window(target);
        let hour = send_hour(automation)?;

        let month_days: Vec<(u32, u32)> = window
            .anchored_dates(hour)
            .into_iter()
            .flat_map(month_days_observed_on)
            .collect();

        if month_days.is_empty() {
            return Ok(EvaluationResult::from_context(window, Vec::new()));
        }

        let clients = store
            .clients_with_birthday(automation.provider_id, &month_days)
            .await?;
        let context = clients.into_iter().map(ContextEntity::Client).collect();

        Ok(EvaluationResult::from_context(window, context))
    }
}

struct NewLeadTrigger;

#[async_trait]
impl TriggerEvaluator for NewLeadTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let target = Offset::behind("minutes_after", OffsetUnit::Minutes, 0).target(automation, now)?;
        let window = default_window(target);

        let clients = store.clients_added(automation.provider_id, &window).await?;
        let context = clients.into_iter().map(ContextEntity::Client).collect();

        Ok(EvaluationResult::from_context(window, context))
    }
}

struct PackageExpiringTrigger;

#[async_trait]
impl TriggerEvaluator for PackageExpiringTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let target = Offset::ahead("days_before", OffsetUnit::Days, 7).target(automation, now)?;
        let window = default_window(target);

        let packages = store.packages_expiring(automation.provider_id, &window).await?;
        let context = packages.into_iter().map(ContextEntity::Package).collect();

        Ok(EvaluationResult::from_context(window, context))
    }
}

struct VisitMilestoneTrigger;

#[async_trait]
impl TriggerEvaluator for VisitMilestoneTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let visit_count = config_number(automation, "visit_count", 10)?;
        if visit_count == 0 {
            return Err(invalid_config(automation, "visit_count must be at least 1"));
        }

        let window = default_window(delayed_target(automation, now)?);
        let bookings = store
            .milestone_bookings(automation.provider_id, &window, visit_count)
            .await?;
        let context = bookings.into_iter().map(ContextEntity::Booking).collect();

        Ok(EvaluationResult::from_context(window, context))
    }
}

struct ClientAnniversaryTrigger;

#[async_trait]
impl TriggerEvaluator for ClientAnniversaryTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let window = default_window(delayed_target(automation, now)?);
        let hour = send_hour(automation)?;

        let mut context = Vec::new();
        for date in window.anchored_dates(hour) {
            let clients = store
                .clients_with_first_visit_anniversary(
                    automation.provider_id,
                    &month_days_observed_on(date),
                    date.year(),
                )
                .await?;
            context.extend(clients.into_iter().map(ContextEntity::Client));
        }

        Ok(EvaluationResult::from_context(window, context))
    }
}

struct ReferralTrigger;

#[async_trait]
impl TriggerEvaluator for ReferralTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let target = Offset::behind("minutes_after", OffsetUnit::Minutes, 0).target(automation, now)?;
        let window = default_window(target);

        let referrals = store.referrals_in_window(automation.provider_id, &window).await?;
        let context = referrals.into_iter().map(ContextEntity::Referral).collect();

        Ok(EvaluationResult::from_context(window, context))
    }
}

/// Fires for every client of the provider once the configured day's send hour is reached
struct SeasonalPromotionTrigger;

#[async_trait]
impl TriggerEvaluator for SeasonalPromotionTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let month = required_number(automation, "month")?;
        let day = required_number(automation, "day")?;
        // 2000 is a leap year, so Feb 29 is accepted here
        if NaiveDate::from_ymd_opt(2000, month as u32, day as u32).is_none() {
            return Err(invalid_config(
                automation,
                format!("month/day {}/{} is not a calendar date", month, day),
            ));
        }

        let window = default_window(delayed_target(automation, now)?);
        let hour = send_hour(automation)?;
        let configured = (month as u32, day as u32);

        let due = window
            .anchored_dates(hour)
            .into_iter()
            .any(|date| month_days_observed_on(date).contains(&configured));

        all_clients_if(store, automation, window, due).await
    }
}

/// Holiday date from config: a fixed date, or a month/day recurring yearly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HolidayDate {
    Once(NaiveDate),
    Yearly { month: u32, day: u32 },
}

impl HolidayDate {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(HolidayDate::Once(date));
        }

        let (month, day) = raw.split_once('-')?;
        let month: u32 = month.parse().ok()?;
        let day: u32 = day.parse().ok()?;
        NaiveDate::from_ymd_opt(2000, month, day)?;
        Some(HolidayDate::Yearly { month, day })
    }

    fn falls_on(&self, date: NaiveDate) -> bool {
        match *self {
            HolidayDate::Once(holiday) => holiday == date,
            HolidayDate::Yearly { month, day } => month_days_observed_on(date).contains(&(month, day)),
        }
    }
}

struct HolidayTrigger;

#[async_trait]
impl TriggerEvaluator for HolidayTrigger {
    async fn evaluate(
        &self,
        store: &dyn AutomationStore,
        automation: &Automation,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, AutomationError> {
        let holiday = match automation.trigger_config.get("date") {
            Some(Value::String(raw)) => HolidayDate::parse(raw).ok_or_else(|| {
                invalid_config(automation, format!("date {:?} is not MM-DD or YYYY-MM-DD", raw))
            })?,
            _ => return Err(invalid_config(automation, "date is required")),
        };

        let target = Offset::ahead("days_before", OffsetUnit::Days, 0).target(automation, now)?;
        let window = default_window(target);
        let hour = send_hour(automation)?;

        let due = window
            .anchored_dates(hour)
            .into_iter()
            .any(|date| holiday.falls_on(date));

        all_clients_if(store, automation, window, due).await
    }
}

async fn all_clients_if(
    store: &dyn AutomationStore,
    automation: &Automation,
    window: TriggerWindow,
    due: bool,
) -> Result<EvaluationResult, AutomationError> {
    if !due {
        return Ok(EvaluationResult::from_context(window, Vec::new()));
    }

    let clients = store.all_clients(automation.provider_id).await?;
    let context = clients.into_iter().map(ContextEntity::Client).collect();

    Ok(EvaluationResult::from_context(window, context))
}
