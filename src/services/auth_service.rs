use crate::config::AdminBootstrapConfig;
use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::*;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};

#[derive(Clone)]
pub struct AuthService {
    pool: DatabaseConnection,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: DatabaseConnection, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.pool)
            .await?)
    }

    /// Username/password login, returns an access + refresh token pair.
    pub async fn login(&self, request: LoginRequest) -> AppResult<TokenPairResponse> {
        let user = self
            .find_by_username(request.username.trim())
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError(
                "Invalid username or password".to_string(),
            ));
        }

        log::info!("User {} logged in", user.id);

        Ok(TokenPairResponse {
            access: self
                .jwt_service
                .generate_access_token(user.id, &user.username, user.is_staff)?,
            refresh: self
                .jwt_service
                .generate_refresh_token(user.id, &user.username, user.is_staff)?,
        })
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AccessTokenResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

        // Re-read the user; the staff flag may have changed
        let user = users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;

        Ok(AccessTokenResponse {
            access: self
                .jwt_service
                .generate_access_token(user.id, &user.username, user.is_staff)?,
        })
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> AppResult<UserResponse> {
        let username = request.username.trim().to_string();
        if username.len() < 2 || username.len() > 150 {
            return Err(AppError::ValidationError(
                "Username length must be between 2 and 150 characters".to_string(),
            ));
        }
        let email = request.email.unwrap_or_default().trim().to_lowercase();
        if !email.is_empty() && !email.contains('@') {
            return Err(AppError::ValidationError("Invalid email".to_string()));
        }
        validate_password(&request.password)?;

        if self.find_by_username(&username).await?.is_some() {
            return Err(AppError::ValidationError(
                "Username already taken".to_string(),
            ));
        }

        let inserted = users::ActiveModel {
            username: Set(username.clone()),
            email: Set(email),
            password_hash: Set(hash_password(&request.password)?),
            is_staff: Set(request.is_staff),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        let user = match inserted {
            Ok(user) => user,
            Err(e) => {
                // A concurrent create took the name between the check and the insert
                let conflict = matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
                    || self.find_by_username(&username).await?.is_some();
                if conflict {
                    return Err(AppError::ValidationError(
                        "Username already taken".to_string(),
                    ));
                }
                return Err(e.into());
            }
        };

        log::info!("User {} created (staff: {})", user.id, user.is_staff);
        Ok(UserResponse::from(user))
    }

    /// Creates the configured staff account unless a user with that name exists.
    pub async fn ensure_admin(&self, admin: &AdminBootstrapConfig) -> AppResult<()> {
        if self.find_by_username(&admin.username).await?.is_some() {
            log::debug!("Admin user {} already present", admin.username);
            return Ok(());
        }

        self.create_user(CreateUserRequest {
            username: admin.username.clone(),
            email: Some(admin.email.clone()),
            password: admin.password.clone(),
            is_staff: true,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    fn user(password: &str) -> users::Model {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        users::Model {
            id: 3,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: hash_password(password).unwrap(),
            is_staff: false,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn service(db: DatabaseConnection) -> (AuthService, JwtService) {
        let jwt = JwtService::new("test-secret", 3600, 7200);
        (AuthService::new(db, jwt.clone()), jwt)
    }

    #[actix_web::test]
    async fn test_login_issues_token_pair() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user("Password123")]])
            .into_connection();
        let (svc, jwt) = service(db);

        let tokens = svc
            .login(LoginRequest {
                username: "alice".into(),
                password: "Password123".into(),
            })
            .await
            .unwrap();

        let claims = jwt.verify_access_token(&tokens.access).unwrap();
        assert_eq!(claims.sub, "3");
        assert!(jwt.verify_refresh_token(&tokens.refresh).is_ok());
    }

    #[actix_web::test]
    async fn test_login_rejects_wrong_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user("Password123")]])
            .into_connection();
        let (svc, _) = service(db);

        let err = svc
            .login(LoginRequest {
                username: "alice".into(),
                password: "Wrong12345".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[actix_web::test]
    async fn test_login_rejects_unknown_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();
        let (svc, _) = service(db);

        let err = svc
            .login(LoginRequest {
                username: "nobody".into(),
                password: "Password123".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[actix_web::test]
    async fn test_create_user_validates_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (svc, _) = service(db);

        let err = svc
            .create_user(CreateUserRequest {
                username: "carol".into(),
                email: None,
                password: "weak".into(),
                is_staff: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[actix_web::test]
    async fn test_create_user_lost_race_reports_taken_name() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .append_query_errors([DbErr::Custom(
                "duplicate key value violates unique constraint".to_string(),
            )])
            .append_query_results([vec![user("Password123")]])
            .into_connection();
        let (svc, _) = service(db);

        let err = svc
            .create_user(CreateUserRequest {
                username: "alice".into(),
                email: None,
                password: "Password123".into(),
                is_staff: false,
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::ValidationError(ref msg) if msg == "Username already taken")
        );
    }

    #[actix_web::test]
    async fn test_create_user_other_insert_failure_is_database_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();
        let (svc, _) = service(db);

        let err = svc
            .create_user(CreateUserRequest {
                username: "dave".into(),
                email: None,
                password: "Password123".into(),
                is_staff: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
