pub mod subscriptions;
pub mod users;

pub use subscriptions as subscription_entity;
pub use subscriptions::SubscriptionStatus;
pub use users as user_entity;
