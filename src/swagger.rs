use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::SubscriptionStatus;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::obtain_token,
        handlers::auth::refresh_token,
        handlers::subscription::get_subscription_status,
        handlers::admin::list_subscriptions,
        handlers::admin::create_subscription,
        handlers::admin::renew_subscription,
        handlers::admin::update_subscription_status,
        handlers::admin::create_user,
    ),
    components(
        schemas(
            LoginRequest,
            TokenPairResponse,
            RefreshTokenRequest,
            AccessTokenResponse,
            CreateUserRequest,
            UserResponse,
            SubscriptionStatus,
            ComputedStatus,
            SubscriptionStatusResponse,
            SubscriptionRecordResponse,
            SubscriptionListItem,
            SubscriptionAdminQuery,
            CreateSubscriptionRequest,
            UpdateSubscriptionStatusRequest,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Token API"),
        (name = "subscription", description = "Subscription status API"),
        (name = "admin", description = "Staff subscription management API"),
    ),
    info(
        title = "Subscription Backend API",
        version = "1.0.0",
        description = "Monthly subscription billing REST API documentation"
    ),
    servers(
        (url = "/api", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/subscription/"));
        assert!(paths.contains_key("/auth/token/"));
        assert!(paths.contains_key("/admin/subscriptions/{id}/renew"));
    }
}
