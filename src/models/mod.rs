pub mod common;
pub mod pagination;
pub mod subscription;
pub mod user;

pub use common::*;
pub use pagination::*;
pub use subscription::*;
pub use user::*;
