use crate::config::DEFAULT_AMOUNT_CENTS;
use crate::utils::period;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, DeriveActiveEnum, EnumIter, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stored subscription flag. Only `Canceled` is authoritative on read; the
/// other two are recomputed from the period end.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "subscription_status")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "past_due")]
    PastDue,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::PastDue => write!(f, "past_due"),
            SubscriptionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub user_id: i64,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<NaiveDate>,
    pub amount_cents: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

/// Fills the columns the database row must never be written without.
///
/// On insert a missing period end becomes the last day of `today`'s month;
/// a period end that is already set is never touched. `updated_at` moves on
/// every save.
pub fn apply_save_defaults(
    am: &mut ActiveModel,
    insert: bool,
    today: NaiveDate,
    now: DateTime<Utc>,
) {
    let missing_period_end = match &am.current_period_end {
        ActiveValue::NotSet => insert,
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => v.is_none(),
    };
    if missing_period_end {
        am.current_period_end = Set(Some(period::last_day_of_month(today)));
    }

    if insert {
        if matches!(am.status, ActiveValue::NotSet) {
            am.status = Set(SubscriptionStatus::Active);
        }
        if matches!(am.amount_cents, ActiveValue::NotSet) {
            am.amount_cents = Set(DEFAULT_AMOUNT_CENTS);
        }
        if matches!(am.created_at, ActiveValue::NotSet) {
            am.created_at = Set(now);
        }
    }
    am.updated_at = Set(now);
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        apply_save_defaults(&mut self, insert, period::today(), Utc::now());
        Ok(self)
    }
}
