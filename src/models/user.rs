use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct AppUser {
    /// Subject id issued by the identity provider.
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields refreshed from the identity provider on every login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

/// A user row as shown on the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRole {
    #[serde(flatten)]
    pub user: AppUser,
    pub role: &'static str,
}

impl UserWithRole {
    pub fn annotate(user: AppUser, admin_emails: &[String]) -> Self {
        let role = if admin_emails.iter().any(|e| *e == user.email) {
            "Admin"
        } else {
            "User"
        };
        Self { user, role }
    }
}
