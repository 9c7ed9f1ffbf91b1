use sqlx::FromRow;
use uuid::Uuid;

/// One registration joined with its user and catalog item.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct RegistrationJoinRow {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub item_id: Uuid,
    pub item_name: String,
}
