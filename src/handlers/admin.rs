use crate::error::{AppError, AppResult};
use crate::middlewares::{CurrentUser, current_user};
use crate::models::*;
use crate::services::{AuthService, SubscriptionService};
use crate::utils::today;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// Staff-only guard.
fn require_staff(req: &HttpRequest) -> AppResult<CurrentUser> {
    let user = current_user(req)?;
    if !user.is_staff {
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}

#[utoipa::path(
    get,
    path = "/admin/subscriptions",
    tag = "admin",
    params(
        ("status" = Option<String>, Query, description = "Stored status: active, past_due or canceled"),
        ("search" = Option<String>, Query, description = "Username or email contains (case-insensitive)"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Page size")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Subscription listing"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Staff only", body = ApiError)
    )
)]
pub async fn list_subscriptions(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    query: web::Query<SubscriptionAdminQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match service.list_for_admin(&query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/subscriptions",
    tag = "admin",
    request_body = CreateSubscriptionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionRecordResponse),
        (status = 200, description = "User already had a subscription", body = SubscriptionRecordResponse),
        (status = 404, description = "User not found", body = ApiError)
    )
)]
pub async fn create_subscription(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    request: web::Json<CreateSubscriptionRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    let request = request.into_inner();
    match service
        .get_or_create_for_user(request.user_id, request.amount_cents)
        .await
    {
        Ok((record, created)) => {
            let body = json!({
                "success": true,
                "data": SubscriptionRecordResponse::from_record(record, today())
            });
            if created {
                Ok(HttpResponse::Created().json(body))
            } else {
                Ok(HttpResponse::Ok().json(body))
            }
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/subscriptions/{id}/renew",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "Subscription id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Period advanced to the end of next month", body = SubscriptionRecordResponse),
        (status = 404, description = "Subscription not found", body = ApiError)
    )
)]
pub async fn renew_subscription(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let staff = match require_staff(&req) {
        Ok(u) => u,
        Err(e) => return Ok(e.error_response()),
    };

    let id = path.into_inner();
    let today = today();
    match service.renew_to_next_month(id, today).await {
        Ok(record) => {
            log::info!("Subscription {id} renewed by {}", staff.username);
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": SubscriptionRecordResponse::from_record(record, today)
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/subscriptions/{id}/status",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "Subscription id")
    ),
    request_body = UpdateSubscriptionStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Stored status updated", body = SubscriptionRecordResponse),
        (status = 404, description = "Subscription not found", body = ApiError)
    )
)]
pub async fn update_subscription_status(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateSubscriptionStatusRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match service
        .set_status(path.into_inner(), request.into_inner().status)
        .await
    {
        Ok(record) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": SubscriptionRecordResponse::from_record(record, today())
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "admin",
    request_body = CreateUserRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input", body = ApiError)
    )
)]
pub async fn create_user(
    auth_service: web::Data<AuthService>,
    req: HttpRequest,
    request: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&req) {
        return Ok(e.error_response());
    }

    match auth_service.create_user(request.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/subscriptions", web::get().to(list_subscriptions))
            .route("/subscriptions", web::post().to(create_subscription))
            .route("/subscriptions/{id}/renew", web::post().to(renew_subscription))
            .route(
                "/subscriptions/{id}/status",
                web::put().to(update_subscription_status),
            )
            .route("/users", web::post().to(create_user)),
    );
}
