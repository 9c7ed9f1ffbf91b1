pub mod admin;
pub mod catalog;
pub mod registration;
pub mod user;

pub use admin::*;
pub use catalog::*;
pub use registration::*;
pub use user::*;
