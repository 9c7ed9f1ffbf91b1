pub mod admin;
pub mod session;

pub use admin::{require_admin, VERIFY_PASSWORD_PATH};
pub use session::{session_cookie, SessionLayer};
