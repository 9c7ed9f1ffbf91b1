use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::RegistrationJoinRow;

/// Everything one user registered for within a program.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    /// Item names in first-seen order, joined with `", "`.
    pub items_registered: String,
    pub total_items: usize,
    pub item_ids: Vec<Uuid>,
}

struct Group {
    user_id: String,
    email: String,
    display_name: Option<String>,
    phone_number: Option<String>,
    item_names: Vec<String>,
    item_ids: Vec<Uuid>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Ascending by display name ignoring case, missing names first, then email.
fn roster_order(
    a_name: Option<&str>,
    a_email: &str,
    b_name: Option<&str>,
    b_email: &str,
) -> Ordering {
    let a_key = a_name.unwrap_or("").to_lowercase();
    let b_key = b_name.unwrap_or("").to_lowercase();
    a_key.cmp(&b_key).then_with(|| a_email.cmp(b_email))
}

/// Group join rows into one entry per email.
///
/// Only users with at least one row appear. The result does not depend on
/// the order of `rows` apart from the item order inside an entry.
pub fn aggregate(rows: &[RegistrationJoinRow]) -> Vec<RosterEntry> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for row in rows {
        let slot = *index.entry(row.email.as_str()).or_insert_with(|| {
            groups.push(Group {
                user_id: row.user_id.clone(),
                email: row.email.clone(),
                display_name: None,
                phone_number: None,
                item_names: Vec::new(),
                item_ids: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        if group.display_name.is_none() {
            group.display_name = non_empty(&row.display_name);
        }
        if group.phone_number.is_none() {
            group.phone_number = non_empty(&row.phone_number);
        }
        group.item_names.push(row.item_name.clone());
        group.item_ids.push(row.item_id);
    }

    let mut entries: Vec<RosterEntry> = groups
        .into_iter()
        .map(|g| RosterEntry {
            user_id: g.user_id,
            email: g.email,
            display_name: g.display_name,
            phone_number: g.phone_number,
            total_items: g.item_names.len(),
            items_registered: g.item_names.join(", "),
            item_ids: g.item_ids,
        })
        .collect();

    entries.sort_by(|a, b| {
        roster_order(
            a.display_name.as_deref(),
            &a.email,
            b.display_name.as_deref(),
            &b.email,
        )
    });
    entries
}

/// Order the raw rows of a single-item roster the same way as entries.
pub fn sort_members(rows: &mut [RegistrationJoinRow]) {
    rows.sort_by(|a, b| {
        roster_order(
            a.display_name.as_deref(),
            &a.email,
            b.display_name.as_deref(),
            &b.email,
        )
    });
}
