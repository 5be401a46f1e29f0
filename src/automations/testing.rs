// In-memory doubles for engine, trigger and handler tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::automations::{
    dispatch::{DispatchReceipt, MessageDispatcher, OutboundMessage},
    error::{AutomationError, DispatchError},
    models::{
        Automation, BookingMatch, ClientMatch, CustomerContact, ExecutionRecord, PackageMatch,
        ReferralMatch,
    },
    repository::{AutomationStore, BookingQuery, BookingTimestamp, ClaimOutcome, ExecutionLog, NewExecution},
    window::TriggerWindow,
};

pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Active automation with a fresh id and provider
pub fn automation(trigger: &str, trigger_config: serde_json::Value, delay_minutes: i32) -> Automation {
    Automation {
        id: Uuid::new_v4(),
        provider_id: Uuid::new_v4(),
        name: "Test automation".to_string(),
        trigger_type: trigger.to_string(),
        trigger_config,
        delay_minutes,
        action_type: "sms".to_string(),
        action_config: serde_json::json!({ "message_template": "Hi {{name}}" }),
        is_active: true,
    }
}

#[derive(Debug, Clone)]
pub struct FakeBooking {
    pub id: Uuid,
    pub booking_number: String,
    pub provider_id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rescheduled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl FakeBooking {
    fn timestamp(&self, which: BookingTimestamp) -> Option<DateTime<Utc>> {
        match which {
            BookingTimestamp::ScheduledAt => Some(self.scheduled_at),
            BookingTimestamp::CompletedAt => self.completed_at,
            BookingTimestamp::UpdatedAt => Some(self.updated_at),
            BookingTimestamp::RescheduledAt => self.rescheduled_at,
        }
    }

    fn to_match(&self) -> BookingMatch {
        BookingMatch {
            booking_id: self.id,
            booking_number: self.booking_number.clone(),
            customer_id: self.customer_id,
            scheduled_at: self.scheduled_at,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeCustomer {
    contact: CustomerContact,
    date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
struct FakeProviderClient {
    provider_id: Uuid,
    customer_id: Uuid,
    created_at: DateTime<Utc>,
    first_visit_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct FakePackage {
    provider_id: Uuid,
    status: String,
    package: PackageMatch,
}

#[derive(Debug, Clone)]
struct FakeReferral {
    provider_id: Uuid,
    created_at: DateTime<Utc>,
    referral: ReferralMatch,
}

#[derive(Default)]
struct Tables {
    automations: Vec<Automation>,
    bookings: Vec<FakeBooking>,
    customers: Vec<FakeCustomer>,
    provider_clients: Vec<FakeProviderClient>,
    packages: Vec<FakePackage>,
    referrals: Vec<FakeReferral>,
    executions: Vec<(ExecutionRecord, NaiveDate)>,
}

/// Store and execution log over plain vectors, mirroring the SQL predicates
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_automation_load: AtomicBool,
    fail_execution_log: AtomicBool,
    booking_seq: AtomicU64,
}

fn db_down() -> AutomationError {
    AutomationError::Database(sqlx::Error::PoolTimedOut)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_automation(&self, automation: Automation) {
        self.tables.lock().unwrap().automations.push(automation);
    }

    pub fn add_customer(&self, name: &str, email: Option<&str>, phone: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().customers.push(FakeCustomer {
            contact: CustomerContact {
                customer_id: id,
                full_name: Some(name.to_string()).filter(|n| !n.is_empty()),
                email: email.map(str::to_string),
                phone: phone.map(str::to_string),
            },
            date_of_birth: None,
        });
        id
    }

    pub fn set_date_of_birth(&self, customer_id: Uuid, date: NaiveDate) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(c) = tables.customers.iter_mut().find(|c| c.contact.customer_id == customer_id) {
            c.date_of_birth = Some(date);
        }
    }

    pub fn link_client(
        &self,
        provider_id: Uuid,
        customer_id: Uuid,
        created_at: DateTime<Utc>,
        first_visit_at: Option<DateTime<Utc>>,
    ) {
        self.tables.lock().unwrap().provider_clients.push(FakeProviderClient {
            provider_id,
            customer_id,
            created_at,
            first_visit_at,
        });
    }

    /// Booking whose other timestamps sit a week before `scheduled_at`
    pub fn add_booking(
        &self,
        provider_id: Uuid,
        customer_id: Uuid,
        status: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let n = self.booking_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.tables.lock().unwrap().bookings.push(FakeBooking {
            id,
            booking_number: format!("BK-{:04}", n),
            provider_id,
            customer_id,
            status: status.to_string(),
            scheduled_at,
            completed_at: None,
            rescheduled_at: None,
            updated_at: scheduled_at - chrono::Duration::days(7),
        });
        id
    }

    fn update_booking(&self, booking_id: Uuid, f: impl FnOnce(&mut FakeBooking)) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(b) = tables.bookings.iter_mut().find(|b| b.id == booking_id) {
            f(b);
        }
    }

    pub fn set_booking_updated_at(&self, booking_id: Uuid, at: DateTime<Utc>) {
        self.update_booking(booking_id, |b| b.updated_at = at);
    }

    pub fn set_booking_completed_at(&self, booking_id: Uuid, at: DateTime<Utc>) {
        self.update_booking(booking_id, |b| b.completed_at = Some(at));
    }

    pub fn set_booking_rescheduled_at(&self, booking_id: Uuid, at: DateTime<Utc>) {
        self.update_booking(booking_id, |b| b.rescheduled_at = Some(at));
    }

    pub fn add_package(
        &self,
        provider_id: Uuid,
        customer_id: Uuid,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().packages.push(FakePackage {
            provider_id,
            status: "active".to_string(),
            package: PackageMatch {
                package_id: id,
                customer_id,
                name: name.to_string(),
                expires_at,
            },
        });
        id
    }

    pub fn add_referral(
        &self,
        provider_id: Uuid,
        referrer: Uuid,
        referred: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().referrals.push(FakeReferral {
            provider_id,
            created_at,
            referral: ReferralMatch {
                referral_id: id,
                customer_id: referrer,
                referred_customer_id: referred,
            },
        });
        id
    }

    pub fn fail_automation_load(&self) {
        self.fail_automation_load.store(true, Ordering::Relaxed);
    }

    pub fn fail_execution_log(&self) {
        self.fail_execution_log.store(true, Ordering::Relaxed);
    }

    pub fn execution_records(&self) -> Vec<ExecutionRecord> {
        self.tables
            .lock()
            .unwrap()
            .executions
            .iter()
            .map(|(record, _)| record.clone())
            .collect()
    }

    fn client_ids(&self, provider_id: Uuid) -> HashSet<Uuid> {
        self.tables
            .lock()
            .unwrap()
            .provider_clients
            .iter()
            .filter(|pc| pc.provider_id == provider_id)
            .map(|pc| pc.customer_id)
            .collect()
    }

    fn execution_log_guard(&self) -> Result<(), AutomationError> {
        if self.fail_execution_log.load(Ordering::Relaxed) {
            Err(db_down())
        } else {
            Ok(())
        }
    }
}

fn in_window(window: &TriggerWindow, instant: Option<DateTime<Utc>>) -> bool {
    instant.map_or(false, |t| window.contains(t))
}

#[async_trait]
impl AutomationStore for InMemoryStore {
    async fn active_automations(&self) -> Result<Vec<Automation>, AutomationError> {
        if self.fail_automation_load.load(Ordering::Relaxed) {
            return Err(db_down());
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .automations
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }

    async fn find_automation(&self, id: Uuid) -> Result<Option<Automation>, AutomationError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .automations
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn bookings_in_window(
        &self,
        provider_id: Uuid,
        query: &BookingQuery,
    ) -> Result<Vec<BookingMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .bookings
            .iter()
            .filter(|b| b.provider_id == provider_id)
            .filter(|b| in_window(&query.window, b.timestamp(query.timestamp)))
            .filter(|b| query.statuses.is_empty() || query.statuses.iter().any(|s| s.as_str() == b.status))
            .map(FakeBooking::to_match)
            .collect())
    }

    async fn inactive_clients(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        let mut customers: Vec<Uuid> = tables
            .bookings
            .iter()
            .filter(|b| b.provider_id == provider_id)
            .map(|b| b.customer_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        customers.sort();

        Ok(customers
            .into_iter()
            .filter(|customer| {
                let mine = || {
                    tables
                        .bookings
                        .iter()
                        .filter(move |b| b.provider_id == provider_id && b.customer_id == *customer)
                };
                let last_completed = mine().filter(|b| b.status == "completed").map(|b| b.scheduled_at).max();
                let last_any = mine().filter(|b| b.status != "cancelled").map(|b| b.scheduled_at).max();
                in_window(window, last_completed) && last_any == last_completed
            })
            .map(|customer_id| ClientMatch { customer_id })
            .collect())
    }

    async fn clients_with_birthday(
        &self,
        provider_id: Uuid,
        month_days: &[(u32, u32)],
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let clients = self.client_ids(provider_id);
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .customers
            .iter()
            .filter(|c| clients.contains(&c.contact.customer_id))
            .filter(|c| {
                c.date_of_birth
                    .map_or(false, |dob| month_days.contains(&(dob.month(), dob.day())))
            })
            .map(|c| ClientMatch {
                customer_id: c.contact.customer_id,
            })
            .collect())
    }

    async fn clients_with_first_visit_anniversary(
        &self,
        provider_id: Uuid,
        month_days: &[(u32, u32)],
        before_year: i32,
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .provider_clients
            .iter()
            .filter(|pc| pc.provider_id == provider_id)
            .filter(|pc| {
                pc.first_visit_at.map_or(false, |first| {
                    first.year() < before_year && month_days.contains(&(first.month(), first.day()))
                })
            })
            .map(|pc| ClientMatch {
                customer_id: pc.customer_id,
            })
            .collect())
    }

    async fn clients_added(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .provider_clients
            .iter()
            .filter(|pc| pc.provider_id == provider_id && window.contains(pc.created_at))
            .map(|pc| ClientMatch {
                customer_id: pc.customer_id,
            })
            .collect())
    }

    async fn all_clients(&self, provider_id: Uuid) -> Result<Vec<ClientMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .provider_clients
            .iter()
            .filter(|pc| pc.provider_id == provider_id)
            .map(|pc| ClientMatch {
                customer_id: pc.customer_id,
            })
            .collect())
    }

    async fn packages_expiring(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<PackageMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .packages
            .iter()
            .filter(|p| p.provider_id == provider_id && p.status == "active")
            .filter(|p| window.contains(p.package.expires_at))
            .map(|p| p.package.clone())
            .collect())
    }

    async fn milestone_bookings(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
        visit_count: i64,
    ) -> Result<Vec<BookingMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        let mut completed: Vec<&FakeBooking> = tables
            .bookings
            .iter()
            .filter(|b| b.provider_id == provider_id && b.status == "completed")
            .filter(|b| b.completed_at.map_or(false, |c| c <= window.end))
            .collect();
        completed.sort_by_key(|b| (b.completed_at, b.id));

        let customers: HashSet<Uuid> = completed.iter().map(|b| b.customer_id).collect();
        let mut matches = Vec::new();
        for customer in customers {
            let nth = completed
                .iter()
                .filter(|b| b.customer_id == customer)
                .nth((visit_count - 1) as usize);
            if let Some(b) = nth {
                if in_window(window, b.completed_at) {
                    matches.push(b.to_match());
                }
            }
        }
        Ok(matches)
    }

    async fn referrals_in_window(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ReferralMatch>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .referrals
            .iter()
            .filter(|r| r.provider_id == provider_id && window.contains(r.created_at))
            .map(|r| r.referral.clone())
            .collect())
    }

    async fn customer_contacts(
        &self,
        customer_ids: &[Uuid],
    ) -> Result<Vec<CustomerContact>, AutomationError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .customers
            .iter()
            .filter(|c| customer_ids.contains(&c.contact.customer_id))
            .map(|c| c.contact.clone())
            .collect())
    }
}

#[async_trait]
impl ExecutionLog for InMemoryStore {
    async fn claim(&self, execution: &NewExecution) -> Result<ClaimOutcome, AutomationError> {
        self.execution_log_guard()?;
        let mut tables = self.tables.lock().unwrap();
        let since = execution.executed_at - chrono::Duration::hours(24);
        let bucket = execution.day_bucket();

        let exists = tables.executions.iter().any(|(record, day)| {
            record.automation_id == execution.automation_id
                && record.customer_id == execution.customer_id
                && (record.executed_at > since || *day == bucket)
        });
        if exists {
            return Ok(ClaimOutcome::Duplicate);
        }

        let id = Uuid::new_v4();
        tables.executions.push((
            ExecutionRecord {
                id,
                automation_id: execution.automation_id,
                customer_id: execution.customer_id,
                action_type: execution.action_type.as_str().to_string(),
                message_id: None,
                context_ref: execution.context_ref.clone(),
                executed_at: execution.executed_at,
            },
            bucket,
        ));
        Ok(ClaimOutcome::Claimed(id))
    }

    async fn confirm(&self, execution_id: Uuid, message_id: Option<&str>) -> Result<(), AutomationError> {
        self.execution_log_guard()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some((record, _)) = tables.executions.iter_mut().find(|(r, _)| r.id == execution_id) {
            record.message_id = message_id.map(str::to_string);
        }
        Ok(())
    }

    async fn release(&self, execution_id: Uuid) -> Result<(), AutomationError> {
        self.execution_log_guard()?;
        self.tables
            .lock()
            .unwrap()
            .executions
            .retain(|(r, _)| r.id != execution_id);
        Ok(())
    }

    async fn recent_executions(
        &self,
        automation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>, AutomationError> {
        self.execution_log_guard()?;
        let mut records: Vec<ExecutionRecord> = self
            .execution_records()
            .into_iter()
            .filter(|r| r.automation_id == automation_id)
            .collect();
        records.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}

/// Dispatcher that records every message it accepts
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<OutboundMessage>>,
    rejected_destinations: Mutex<HashSet<String>>,
    latency: Mutex<Option<Duration>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, destination: &str) {
        self.rejected_destinations
            .lock()
            .unwrap()
            .insert(destination.to_string());
    }

    pub fn accept_all(&self) {
        self.rejected_destinations.lock().unwrap().clear();
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageDispatcher for RecordingDispatcher {
    async fn send(&self, message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self
            .rejected_destinations
            .lock()
            .unwrap()
            .contains(&message.destination)
        {
            return Err(DispatchError::Rejected("destination unreachable".to_string()));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(DispatchReceipt {
            message_id: Some(format!("msg-{}", sent.len())),
        })
    }
}
