pub mod jwt;
pub mod password;
pub mod period;

pub use jwt::*;
pub use password::*;
pub use period::{last_day_of_month, next_month_last_day, renewed_period_end, today};
