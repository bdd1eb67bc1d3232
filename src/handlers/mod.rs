pub mod admin;
pub mod auth;
pub mod subscription;

pub use admin::admin_config;
pub use auth::auth_config;
pub use subscription::subscription_config;
