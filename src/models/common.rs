use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body produced by `AppError`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
