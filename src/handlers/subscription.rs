use crate::middlewares::current_user;
use crate::models::*;
use crate::services::SubscriptionService;
use crate::utils::today;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/subscription/",
    tag = "subscription",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Derived subscription status of the caller", body = SubscriptionStatusResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    )
)]
/// Computed status, days remaining and next due date for the caller.
/// Users without a record get `status: "none"`.
pub async fn get_subscription_status(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match service.status_for_user(user.id, today()).await {
        Ok(view) => Ok(HttpResponse::Ok().json(view)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn subscription_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/subscription", web::get().to(get_subscription_status))
        .route("/subscription/", web::get().to(get_subscription_status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SubscriptionStatus, subscription_entity as subs};
    use crate::middlewares::AuthMiddleware;
    use crate::utils::{JwtService, last_day_of_month};
    use actix_web::dev::Service;
    use actix_web::{App, http::StatusCode, test};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::{Value, json};

    fn jwt() -> JwtService {
        JwtService::new("test-secret", 3600, 7200)
    }

    macro_rules! test_app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .wrap(AuthMiddleware::new(jwt()))
                    .app_data(web::Data::new(SubscriptionService::new($db, 1000)))
                    .service(web::scope("/api").configure(subscription_config)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_no_record_returns_exact_none_body() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subs::Model>::new()])
            .into_connection();
        let app = test_app!(db);
        let token = jwt().generate_access_token(7, "alice", false).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/subscription/")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(
            body.as_ref(),
            br#"{"status":"none","days_remaining":null,"next_due_date":null}"#
        );
    }

    #[actix_web::test]
    async fn test_record_is_rendered_with_amount() {
        let today = today();
        let end = last_day_of_month(today);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![subs::Model {
                id: 1,
                user_id: 7,
                status: SubscriptionStatus::Active,
                current_period_end: Some(end),
                amount_cents: 1000,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }]])
            .into_connection();
        let app = test_app!(db);
        let token = jwt().generate_access_token(7, "alice", false).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/subscription/")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(
            body,
            json!({
                "status": "active",
                "days_remaining": (end - today).num_days(),
                "next_due_date": end.format("%Y-%m-%d").to_string(),
                "amount_cents": 1000
            })
        );
    }

    #[actix_web::test]
    async fn test_missing_token_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = test_app!(db);

        let req = test::TestRequest::get()
            .uri("/api/subscription/")
            .to_request();
        let err = app
            .call(req)
            .await
            .err()
            .expect("request without token must fail");
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
    }
}
