use crate::entities::{SubscriptionStatus, subscription_entity as subs, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::renewed_period_end;
use chrono::NaiveDate;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
    TransactionTrait,
};

#[derive(Clone)]
pub struct SubscriptionService {
    pool: DatabaseConnection,
    default_amount_cents: i32,
}

impl SubscriptionService {
    pub fn new(pool: DatabaseConnection, default_amount_cents: i32) -> Self {
        Self {
            pool,
            default_amount_cents,
        }
    }

    pub async fn find_by_user(&self, user_id: i64) -> AppResult<Option<subs::Model>> {
        Ok(subs::Entity::find()
            .filter(subs::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?)
    }

    async fn get(&self, subscription_id: i64) -> AppResult<subs::Model> {
        subs::Entity::find_by_id(subscription_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))
    }

    /// Derived view for the status endpoint. Read-only.
    pub async fn status_for_user(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> AppResult<SubscriptionStatusResponse> {
        Ok(match self.find_by_user(user_id).await? {
            Some(record) => SubscriptionStatusResponse::from_record(&record, today),
            None => SubscriptionStatusResponse::none(),
        })
    }

    /// Returns the user's single record, creating it on first use. The boolean
    /// is `true` when this call created it.
    pub async fn get_or_create_for_user(
        &self,
        user_id: i64,
        amount_cents: Option<i32>,
    ) -> AppResult<(subs::Model, bool)> {
        if let Some(existing) = self.find_by_user(user_id).await? {
            return Ok((existing, false));
        }

        let amount_cents = amount_cents.unwrap_or(self.default_amount_cents);
        if amount_cents < 0 {
            return Err(AppError::ValidationError(
                "amount_cents must not be negative".to_string(),
            ));
        }

        let inserted = subs::ActiveModel {
            user_id: Set(user_id),
            status: Set(SubscriptionStatus::Active),
            amount_cents: Set(amount_cents),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(record) => {
                log::info!(
                    "Subscription {} created for user {user_id}, period ends {:?}",
                    record.id,
                    record.current_period_end
                );
                Ok((record, true))
            }
            Err(e) => match e.sql_err() {
                // concurrent create: another request inserted first
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    let record = self.find_by_user(user_id).await?.ok_or_else(|| {
                        AppError::InternalError("Subscription vanished after conflict".into())
                    })?;
                    Ok((record, false))
                }
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    Err(AppError::NotFound("User not found".to_string()))
                }
                _ => Err(e.into()),
            },
        }
    }

    /// Advances the period end to the last day of the following month.
    ///
    /// The stored status is left as is, so renewing a canceled record only
    /// extends its period. Read and write happen in one transaction with the
    /// row locked.
    pub async fn renew_to_next_month(
        &self,
        subscription_id: i64,
        today: NaiveDate,
    ) -> AppResult<subs::Model> {
        let txn = self.pool.begin().await?;

        let record = subs::Entity::find_by_id(subscription_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;

        let previous = record.current_period_end;
        let next = renewed_period_end(previous, today);

        if record.status == SubscriptionStatus::Canceled {
            log::warn!("Renewing canceled subscription {subscription_id}");
        }

        let mut am = record.into_active_model();
        am.current_period_end = Set(Some(next));
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        log::info!("Subscription {subscription_id} renewed: {previous:?} -> {next}");
        Ok(updated)
    }

    /// Direct edit of the stored flag, e.g. administrative cancellation.
    pub async fn set_status(
        &self,
        subscription_id: i64,
        status: SubscriptionStatus,
    ) -> AppResult<subs::Model> {
        let record = self.get(subscription_id).await?;
        if record.status == status {
            return Ok(record);
        }

        let previous = record.status;
        let mut am = record.into_active_model();
        am.status = Set(status);
        let updated = am.update(&self.pool).await?;

        log::info!("Subscription {subscription_id} status changed: {previous} -> {status}");
        Ok(updated)
    }

    /// Staff listing, newest first. `status` filters the stored flag and
    /// `search` matches username or email case-insensitively.
    pub async fn list_for_admin(
        &self,
        query: &SubscriptionAdminQuery,
    ) -> AppResult<PaginatedResponse<SubscriptionListItem>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base = subs::Entity::find().join(JoinType::InnerJoin, subs::Relation::User.def());

        if let Some(status) = query.status {
            base = base.filter(subs::Column::Status.eq(status));
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(term);
            base = base.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            users::Entity,
                            users::Column::Username,
                        ))))
                        .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            users::Entity,
                            users::Column::Email,
                        ))))
                        .like(pattern),
                    ),
            );
        }

        let total = base.clone().count(&self.pool).await?;

        let rows = base
            .select_also(users::Entity)
            .order_by_desc(subs::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        let items = rows.into_iter().map(SubscriptionListItem::from).collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }
}

/// `%term%` with LIKE wildcards in the term escaped, lower-cased.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::BTreeMap;

    // Debug output escapes quotes inside the SQL text
    fn sql_log(db: DatabaseConnection) -> String {
        format!("{:?}", db.into_transaction_log()).replace("\\\"", "\"")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn record(status: SubscriptionStatus, end: Option<NaiveDate>) -> subs::Model {
        subs::Model {
            id: 5,
            user_id: 9,
            status,
            current_period_end: end,
            amount_cents: 1000,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn user() -> users::Model {
        users::Model {
            id: 9,
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: String::new(),
            is_staff: false,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[actix_web::test]
    async fn test_status_without_record_is_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subs::Model>::new()])
            .into_connection();
        let svc = SubscriptionService::new(db, 1000);

        let resp = svc.status_for_user(9, date(2024, 3, 10)).await.unwrap();
        assert_eq!(resp.status, ComputedStatus::NoSubscription);
        assert_eq!(resp.days_remaining, None);
        assert_eq!(resp.next_due_date, None);
        assert_eq!(resp.amount_cents, None);
    }

    #[actix_web::test]
    async fn test_status_with_canceled_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![record(
                SubscriptionStatus::Canceled,
                Some(date(2024, 12, 31)),
            )]])
            .into_connection();
        let svc = SubscriptionService::new(db, 1000);

        let resp = svc.status_for_user(9, date(2024, 3, 10)).await.unwrap();
        assert_eq!(resp.status, ComputedStatus::Canceled);
        assert_eq!(resp.next_due_date, Some(date(2024, 12, 31)));
        assert_eq!(resp.amount_cents, Some(1000));
    }

    #[actix_web::test]
    async fn test_get_or_create_returns_existing() {
        let existing = record(SubscriptionStatus::Active, Some(date(2024, 3, 31)));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();
        let svc = SubscriptionService::new(db, 1000);

        let (found, created) = svc.get_or_create_for_user(9, None).await.unwrap();
        assert!(!created);
        assert_eq!(found, existing);
    }

    #[actix_web::test]
    async fn test_get_or_create_inserts_with_defaults() {
        let inserted = record(SubscriptionStatus::Active, Some(date(2024, 3, 31)));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subs::Model>::new()])
            .append_query_results([vec![inserted.clone()]])
            .into_connection();
        let svc = SubscriptionService::new(db.clone(), 1500);

        let (model, created) = svc.get_or_create_for_user(9, None).await.unwrap();
        assert!(created);
        assert_eq!(model, inserted);

        let log = sql_log(db);
        assert!(log.contains("INSERT INTO \"subscriptions\""));
        assert!(log.contains("1500"));
    }

    #[actix_web::test]
    async fn test_get_or_create_rejects_negative_amount() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subs::Model>::new()])
            .into_connection();
        let svc = SubscriptionService::new(db, 1000);

        let err = svc.get_or_create_for_user(9, Some(-1)).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[actix_web::test]
    async fn test_renew_advances_to_next_month_end() {
        let current = record(SubscriptionStatus::Active, Some(date(2024, 1, 31)));
        let renewed = subs::Model {
            current_period_end: Some(date(2024, 2, 29)),
            ..current.clone()
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![current]])
            .append_query_results([vec![renewed.clone()]])
            .into_connection();
        let svc = SubscriptionService::new(db.clone(), 1000);

        let model = svc
            .renew_to_next_month(5, date(2024, 1, 15))
            .await
            .unwrap();
        assert_eq!(model.current_period_end, Some(date(2024, 2, 29)));

        let log = sql_log(db);
        assert!(log.contains("FOR UPDATE"));
        assert!(log.contains("2024-02-29"));
        // only the period end and updated_at are written
        assert!(log.contains(r#"SET "current_period_end" = $1, "updated_at" = $2"#));
        assert!(!log.contains(r#""status" = $"#));
    }

    #[actix_web::test]
    async fn test_renew_missing_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subs::Model>::new()])
            .into_connection();
        let svc = SubscriptionService::new(db, 1000);

        let err = svc
            .renew_to_next_month(5, date(2024, 1, 15))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn test_set_status_cancels() {
        let current = record(SubscriptionStatus::Active, Some(date(2024, 1, 31)));
        let canceled = subs::Model {
            status: SubscriptionStatus::Canceled,
            ..current.clone()
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![current]])
            .append_query_results([vec![canceled.clone()]])
            .into_connection();
        let svc = SubscriptionService::new(db, 1000);

        let model = svc
            .set_status(5, SubscriptionStatus::Canceled)
            .await
            .unwrap();
        assert_eq!(model.status, SubscriptionStatus::Canceled);
        assert_eq!(
            model.computed_status(date(2024, 1, 1)),
            ComputedStatus::Canceled
        );
    }

    #[actix_web::test]
    async fn test_list_for_admin_filters_and_pages() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[BTreeMap::from([(
                "num_items".to_string(),
                sea_orm::Value::BigInt(Some(1)),
            )])]])
            .append_query_results([vec![(
                record(SubscriptionStatus::PastDue, Some(date(2024, 1, 31))),
                user(),
            )]])
            .into_connection();
        let svc = SubscriptionService::new(db.clone(), 1000);

        let page = svc
            .list_for_admin(&SubscriptionAdminQuery {
                status: Some(SubscriptionStatus::PastDue),
                search: Some("ANA_".to_string()),
                page: Some(1),
                per_page: Some(10),
            })
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].username, "ana");
        assert_eq!(page.data[0].status, SubscriptionStatus::PastDue);

        let log = sql_log(db);
        assert!(log.contains("LOWER"));
        assert!(log.contains(r"%ana\\_%"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Ana"), "%ana%");
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
    }
}
