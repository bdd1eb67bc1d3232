use crate::entities::{SubscriptionStatus, subscription_entity as subs, user_entity as users};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status shown to clients. Unlike [`SubscriptionStatus`] it is derived at read
/// time and has a `none` value for users without a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComputedStatus {
    Active,
    PastDue,
    Canceled,
    #[serde(rename = "none")]
    NoSubscription,
}

/// Signed number of days from `today` until `period_end`.
pub fn days_remaining(period_end: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    period_end.map(|end| (end - today).num_days())
}

/// Two-step evaluation: a stored cancellation wins outright, otherwise the
/// period end decides.
pub fn compute_status(
    stored: SubscriptionStatus,
    period_end: Option<NaiveDate>,
    today: NaiveDate,
) -> ComputedStatus {
    if stored == SubscriptionStatus::Canceled {
        return ComputedStatus::Canceled;
    }
    match days_remaining(period_end, today) {
        Some(days) if days >= 0 => ComputedStatus::Active,
        // never provisioned or already lapsed
        _ => ComputedStatus::PastDue,
    }
}

impl subs::Model {
    pub fn days_remaining(&self, today: NaiveDate) -> Option<i64> {
        days_remaining(self.current_period_end, today)
    }

    pub fn computed_status(&self, today: NaiveDate) -> ComputedStatus {
        compute_status(self.status, self.current_period_end, today)
    }
}

/// Body of `GET /api/subscription/`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionStatusResponse {
    pub status: ComputedStatus,
    pub days_remaining: Option<i64>,
    #[schema(value_type = Option<String>, format = Date, example = "2024-02-29")]
    pub next_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i32>,
}

impl SubscriptionStatusResponse {
    pub fn none() -> Self {
        Self {
            status: ComputedStatus::NoSubscription,
            days_remaining: None,
            next_due_date: None,
            amount_cents: None,
        }
    }

    pub fn from_record(record: &subs::Model, today: NaiveDate) -> Self {
        Self {
            status: record.computed_status(today),
            days_remaining: record.days_remaining(today),
            next_due_date: record.current_period_end,
            amount_cents: Some(record.amount_cents),
        }
    }
}

/// Stored record as seen by staff.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionRecordResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: SubscriptionStatus,
    pub computed_status: ComputedStatus,
    #[schema(value_type = Option<String>, format = Date)]
    pub current_period_end: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
    pub amount_cents: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecordResponse {
    pub fn from_record(m: subs::Model, today: NaiveDate) -> Self {
        Self {
            computed_status: m.computed_status(today),
            days_remaining: m.days_remaining(today),
            id: m.id,
            user_id: m.user_id,
            status: m.status,
            current_period_end: m.current_period_end,
            amount_cents: m.amount_cents,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// One row of the staff listing: user, status, current_period_end, amount_cents, created_at.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionListItem {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub status: SubscriptionStatus,
    #[schema(value_type = Option<String>, format = Date)]
    pub current_period_end: Option<NaiveDate>,
    pub amount_cents: i32,
    pub created_at: DateTime<Utc>,
}

impl From<(subs::Model, Option<users::Model>)> for SubscriptionListItem {
    fn from((s, u): (subs::Model, Option<users::Model>)) -> Self {
        let (username, email) = u.map(|u| (u.username, u.email)).unwrap_or_default();
        Self {
            id: s.id,
            user_id: s.user_id,
            username,
            email,
            status: s.status,
            current_period_end: s.current_period_end,
            amount_cents: s.amount_cents,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionAdminQuery {
    pub status: Option<SubscriptionStatus>,
    /// Matches username or email, case-insensitive.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    pub user_id: i64,
    #[schema(example = 1000)]
    pub amount_cents: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubscriptionStatusRequest {
    pub status: SubscriptionStatus,
}
