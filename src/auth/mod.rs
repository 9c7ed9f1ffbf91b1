pub mod gate;
pub mod password;

pub use gate::{is_admin, AdminGate, AllowListGate, AdminTableGate};
pub use password::AdminPassword;

use serde::Serialize;

/// The administrator behind the current request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdminInfo {
    pub email: String,
    pub name: Option<String>,
}
