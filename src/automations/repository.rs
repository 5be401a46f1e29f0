// Storage access for the automation engine
//
// `AutomationStore` answers the read-only questions triggers ask;
// `ExecutionLog` owns the append-only execution records used for
// de-duplication. Both have Postgres implementations here.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::automations::{
    error::AutomationError,
    models::{
        ActionType, Automation, BookingMatch, ClientMatch, CustomerContact, ExecutionRecord,
        PackageMatch, ReferralMatch,
    },
    window::TriggerWindow,
};

/// Booking status values as stored by the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    NoShow,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// Booking timestamp a trigger window is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingTimestamp {
    ScheduledAt,
    CompletedAt,
    UpdatedAt,
    RescheduledAt,
}

impl BookingTimestamp {
    fn column(&self) -> &'static str {
        match self {
            BookingTimestamp::ScheduledAt => "scheduled_at",
            BookingTimestamp::CompletedAt => "completed_at",
            BookingTimestamp::UpdatedAt => "updated_at",
            BookingTimestamp::RescheduledAt => "rescheduled_at",
        }
    }
}

/// Bookings of one provider whose `timestamp` lies in `window`
#[derive(Debug, Clone)]
pub struct BookingQuery {
    pub timestamp: BookingTimestamp,
    /// Empty means any status
    pub statuses: &'static [BookingStatus],
    pub window: TriggerWindow,
}

#[async_trait]
pub trait AutomationStore: Send + Sync {
    async fn active_automations(&self) -> Result<Vec<Automation>, AutomationError>;

    async fn find_automation(&self, id: Uuid) -> Result<Option<Automation>, AutomationError>;

    async fn bookings_in_window(
        &self,
        provider_id: Uuid,
        query: &BookingQuery,
    ) -> Result<Vec<BookingMatch>, AutomationError>;

    /// Clients whose latest completed visit falls in the window with nothing booked since
    async fn inactive_clients(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ClientMatch>, AutomationError>;

    async fn clients_with_birthday(
        &self,
        provider_id: Uuid,
        month_days: &[(u32, u32)],
    ) -> Result<Vec<ClientMatch>, AutomationError>;

    /// Clients whose first visit was on one of `month_days` in a year before `before_year`
    async fn clients_with_first_visit_anniversary(
        &self,
        provider_id: Uuid,
        month_days: &[(u32, u32)],
        before_year: i32,
    ) -> Result<Vec<ClientMatch>, AutomationError>;

    async fn clients_added(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ClientMatch>, AutomationError>;

    async fn all_clients(&self, provider_id: Uuid) -> Result<Vec<ClientMatch>, AutomationError>;

    async fn packages_expiring(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<PackageMatch>, AutomationError>;

    /// Completions in the window that are the client's `visit_count`-th completed visit
    async fn milestone_bookings(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
        visit_count: i64,
    ) -> Result<Vec<BookingMatch>, AutomationError>;

    async fn referrals_in_window(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ReferralMatch>, AutomationError>;

    async fn customer_contacts(
        &self,
        customer_ids: &[Uuid],
    ) -> Result<Vec<CustomerContact>, AutomationError>;
}

/// Execution record about to be claimed
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub automation_id: Uuid,
    pub customer_id: Uuid,
    pub action_type: ActionType,
    pub context_ref: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl NewExecution {
    /// UTC day the record is bucketed under for the uniqueness constraint
    pub fn day_bucket(&self) -> NaiveDate {
        self.executed_at.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Record inserted; the caller owns the send
    Claimed(Uuid),
    /// A record for the pair exists within the trailing 24 hours
    Duplicate,
}

#[async_trait]
pub trait ExecutionLog: Send + Sync {
    /// Insert the record iff none exists for (automation, customer) in the
    /// trailing 24 hours, as one conditional insert.
    async fn claim(&self, execution: &NewExecution) -> Result<ClaimOutcome, AutomationError>;

    /// Attach the dispatched message id to a claimed record
    async fn confirm(&self, execution_id: Uuid, message_id: Option<&str>) -> Result<(), AutomationError>;

    /// Drop a claim whose dispatch failed so a later pass may retry
    async fn release(&self, execution_id: Uuid) -> Result<(), AutomationError>;

    async fn recent_executions(
        &self,
        automation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>, AutomationError>;
}

const AUTOMATION_COLUMNS: &str = "id, provider_id, name, trigger_type, trigger_config, \
     delay_minutes, action_type, action_config, is_active";

/// Postgres-backed store for automations, trigger queries and execution records
#[derive(Clone)]
pub struct PgAutomationStore {
    pool: PgPool,
}

impl PgAutomationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn split_month_days(month_days: &[(u32, u32)]) -> (Vec<i32>, Vec<i32>) {
    month_days
        .iter()
        .map(|(m, d)| (*m as i32, *d as i32))
        .unzip()
}

#[async_trait]
impl AutomationStore for PgAutomationStore {
    async fn active_automations(&self) -> Result<Vec<Automation>, AutomationError> {
        let automations = sqlx::query_as::<_, Automation>(&format!(
            "SELECT {} FROM automations WHERE is_active = TRUE ORDER BY created_at, id",
            AUTOMATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(automations)
    }

    async fn find_automation(&self, id: Uuid) -> Result<Option<Automation>, AutomationError> {
        let automation = sqlx::query_as::<_, Automation>(&format!(
            "SELECT {} FROM automations WHERE id = $1",
            AUTOMATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(automation)
    }

    async fn bookings_in_window(
        &self,
        provider_id: Uuid,
        query: &BookingQuery,
    ) -> Result<Vec<BookingMatch>, AutomationError> {
        let column = query.timestamp.column();
        let statuses: Vec<String> = query.statuses.iter().map(|s| s.as_str().to_string()).collect();

        let sql = format!(
            r#"
            SELECT id AS booking_id, booking_number, customer_id, scheduled_at
            FROM bookings
            WHERE provider_id = $1
              AND {column} BETWEEN $2 AND $3
              AND (cardinality($4::text[]) = 0 OR status = ANY($4))
            ORDER BY {column}, id
            "#
        );

        let bookings = sqlx::query_as::<_, BookingMatch>(&sql)
            .bind(provider_id)
            .bind(query.window.start)
            .bind(query.window.end)
            .bind(&statuses)
            .fetch_all(&self.pool)
            .await?;

        Ok(bookings)
    }

    async fn inactive_clients(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let clients = sqlx::query_as::<_, ClientMatch>(
            r#"
            SELECT customer_id
            FROM bookings
            WHERE provider_id = $1
            GROUP BY customer_id
            HAVING MAX(scheduled_at) FILTER (WHERE status = 'completed') BETWEEN $2 AND $3
               AND MAX(scheduled_at) FILTER (WHERE status <> 'cancelled')
                   = MAX(scheduled_at) FILTER (WHERE status = 'completed')
            ORDER BY customer_id
            "#,
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    async fn clients_with_birthday(
        &self,
        provider_id: Uuid,
        month_days: &[(u32, u32)],
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let (months, days) = split_month_days(month_days);

        let clients = sqlx::query_as::<_, ClientMatch>(
            r#"
            SELECT c.id AS customer_id
            FROM customers c
            JOIN provider_clients pc ON pc.customer_id = c.id
            WHERE pc.provider_id = $1
              AND c.date_of_birth IS NOT NULL
              AND (EXTRACT(MONTH FROM c.date_of_birth)::int, EXTRACT(DAY FROM c.date_of_birth)::int)
                  IN (SELECT * FROM UNNEST($2::int[], $3::int[]))
            ORDER BY c.id
            "#,
        )
        .bind(provider_id)
        .bind(&months)
        .bind(&days)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    async fn clients_with_first_visit_anniversary(
        &self,
        provider_id: Uuid,
        month_days: &[(u32, u32)],
        before_year: i32,
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let (months, days) = split_month_days(month_days);

        let clients = sqlx::query_as::<_, ClientMatch>(
            r#"
            SELECT customer_id
            FROM provider_clients
            WHERE provider_id = $1
              AND first_visit_at IS NOT NULL
              AND EXTRACT(YEAR FROM first_visit_at AT TIME ZONE 'UTC')::int < $4
              AND (EXTRACT(MONTH FROM first_visit_at AT TIME ZONE 'UTC')::int,
                   EXTRACT(DAY FROM first_visit_at AT TIME ZONE 'UTC')::int)
                  IN (SELECT * FROM UNNEST($2::int[], $3::int[]))
            ORDER BY customer_id
            "#,
        )
        .bind(provider_id)
        .bind(&months)
        .bind(&days)
        .bind(before_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    async fn clients_added(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ClientMatch>, AutomationError> {
        let clients = sqlx::query_as::<_, ClientMatch>(
            r#"
            SELECT customer_id
            FROM provider_clients
            WHERE provider_id = $1 AND created_at BETWEEN $2 AND $3
            ORDER BY created_at, customer_id
            "#,
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    async fn all_clients(&self, provider_id: Uuid) -> Result<Vec<ClientMatch>, AutomationError> {
        let clients = sqlx::query_as::<_, ClientMatch>(
            "SELECT customer_id FROM provider_clients WHERE provider_id = $1 ORDER BY customer_id",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    async fn packages_expiring(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<PackageMatch>, AutomationError> {
        let packages = sqlx::query_as::<_, PackageMatch>(
            r#"
            SELECT id AS package_id, customer_id, name, expires_at
            FROM customer_packages
            WHERE provider_id = $1
              AND status = 'active'
              AND expires_at BETWEEN $2 AND $3
            ORDER BY expires_at, id
            "#,
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(packages)
    }

    async fn milestone_bookings(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
        visit_count: i64,
    ) -> Result<Vec<BookingMatch>, AutomationError> {
        let bookings = sqlx::query_as::<_, BookingMatch>(
            r#"
            SELECT booking_id, booking_number, customer_id, scheduled_at
            FROM (
                SELECT id AS booking_id, booking_number, customer_id, scheduled_at, completed_at,
                       ROW_NUMBER() OVER (PARTITION BY customer_id ORDER BY completed_at, id) AS visit_number
                FROM bookings
                WHERE provider_id = $1
                  AND status = 'completed'
                  AND completed_at IS NOT NULL
                  AND completed_at <= $3
            ) ranked
            WHERE visit_number = $4 AND completed_at >= $2
            ORDER BY completed_at, booking_id
            "#,
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .bind(visit_count)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn referrals_in_window(
        &self,
        provider_id: Uuid,
        window: &TriggerWindow,
    ) -> Result<Vec<ReferralMatch>, AutomationError> {
        let referrals = sqlx::query_as::<_, ReferralMatch>(
            r#"
            SELECT id AS referral_id, referrer_customer_id AS customer_id, referred_customer_id
            FROM referrals
            WHERE provider_id = $1 AND created_at BETWEEN $2 AND $3
            ORDER BY created_at, id
            "#,
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }

    async fn customer_contacts(
        &self,
        customer_ids: &[Uuid],
    ) -> Result<Vec<CustomerContact>, AutomationError> {
        if customer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let contacts = sqlx::query_as::<_, CustomerContact>(
            "SELECT id AS customer_id, full_name, email, phone FROM customers WHERE id = ANY($1)",
        )
        .bind(customer_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }
}

#[async_trait]
impl ExecutionLog for PgAutomationStore {
    async fn claim(&self, execution: &NewExecution) -> Result<ClaimOutcome, AutomationError> {
        // The NOT EXISTS guard enforces the trailing 24 hours; the unique day
        // bucket catches two passes inserting for the same pair concurrently.
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO automation_executions
                (automation_id, customer_id, action_type, context_ref, executed_at, day_bucket)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM automation_executions
                WHERE automation_id = $1
                  AND customer_id = $2
                  AND executed_at > $5 - INTERVAL '24 hours'
            )
            ON CONFLICT (automation_id, customer_id, day_bucket) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(execution.automation_id)
        .bind(execution.customer_id)
        .bind(execution.action_type.as_str())
        .bind(&execution.context_ref)
        .bind(execution.executed_at)
        .bind(execution.day_bucket())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(id) => ClaimOutcome::Claimed(id),
            None => ClaimOutcome::Duplicate,
        })
    }

    async fn confirm(&self, execution_id: Uuid, message_id: Option<&str>) -> Result<(), AutomationError> {
        sqlx::query("UPDATE automation_executions SET message_id = $1 WHERE id = $2")
            .bind(message_id)
            .bind(execution_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn release(&self, execution_id: Uuid) -> Result<(), AutomationError> {
        sqlx::query("DELETE FROM automation_executions WHERE id = $1 AND message_id IS NULL")
            .bind(execution_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn recent_executions(
        &self,
        automation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>, AutomationError> {
        let records = sqlx::query_as::<_, ExecutionRecord>(
            r#"
            SELECT id, automation_id, customer_id, action_type, message_id, context_ref, executed_at
            FROM automation_executions
            WHERE automation_id = $1
            ORDER BY executed_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(automation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
