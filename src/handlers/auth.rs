use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/auth/token/",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = TokenPairResponse),
        (status = 401, description = "Invalid username or password", body = ApiError)
    )
)]
pub async fn obtain_token(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(request.into_inner()).await {
        Ok(tokens) => Ok(HttpResponse::Ok().json(tokens)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/token/refresh/",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Invalid refresh token", body = ApiError)
    )
)]
pub async fn refresh_token(
    auth_service: web::Data<AuthService>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    match auth_service.refresh_token(&request.refresh).await {
        Ok(token) => Ok(HttpResponse::Ok().json(token)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/token", web::post().to(obtain_token))
            .route("/token/", web::post().to(obtain_token))
            .route("/token/refresh", web::post().to(refresh_token))
            .route("/token/refresh/", web::post().to(refresh_token)),
    );
}
