use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog owned by one of the portal's programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Program {
    Courses,
    TechWeekend,
}

impl Program {
    pub const ALL: [Program; 2] = [Program::Courses, Program::TechWeekend];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::TechWeekend => "techweekend",
        }
    }

    /// Singular noun used in user-facing messages.
    pub fn item_noun(&self) -> &'static str {
        match self {
            Self::Courses => "course",
            Self::TechWeekend => "event",
        }
    }

    pub fn user_dashboard_path(&self) -> &'static str {
        match self {
            Self::Courses => "/dashboard",
            Self::TechWeekend => "/tech-weekend",
        }
    }

    pub fn admin_dashboard_path(&self) -> &'static str {
        match self {
            Self::Courses => "/admin/dashboard",
            Self::TechWeekend => "/admin/techweekend/dashboard",
        }
    }

    pub fn grouped_csv_filename(&self) -> &'static str {
        match self {
            Self::Courses => "registrations_grouped.csv",
            Self::TechWeekend => "techweekend_registrations_grouped.csv",
        }
    }

    pub fn item_csv_filename(&self, item_id: Uuid) -> String {
        match self {
            Self::Courses => format!("registrations_{}.csv", item_id),
            Self::TechWeekend => format!("techweekend_registrations_{}.csv", item_id),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Program {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "courses" => Ok(Self::Courses),
            "techweekend" => Ok(Self::TechWeekend),
            other => Err(format!("unknown program: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogItem {
    pub id: Uuid,
    pub program: Program,
    pub name: String,
    pub description: String,
    pub poster_url: Option<String>,
    pub handout_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn asset_urls(&self) -> impl Iterator<Item = &str> {
        self.poster_url
            .as_deref()
            .into_iter()
            .chain(self.handout_url.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub name: String,
    pub description: String,
    pub poster_url: Option<String>,
    pub handout_url: Option<String>,
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub handout_url: Option<String>,
}

impl CatalogPatch {
    pub fn apply(self, item: &mut CatalogItem) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        if let Some(url) = self.poster_url {
            item.poster_url = Some(url);
        }
        if let Some(url) = self.handout_url {
            item.handout_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> CatalogItem {
        CatalogItem {
            id: Uuid::new_v4(),
            program: Program::Courses,
            name: "Rust 101".into(),
            description: "Intro".into(),
            poster_url: Some("https://cdn/p.png".into()),
            handout_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_patch_keeps_omitted_fields() {
        let mut item = item();
        CatalogPatch {
            description: Some("Updated".into()),
            handout_url: Some("https://cdn/h.pdf".into()),
            ..Default::default()
        }
        .apply(&mut item);

        assert_eq!(item.name, "Rust 101");
        assert_eq!(item.description, "Updated");
        assert_eq!(item.poster_url.as_deref(), Some("https://cdn/p.png"));
        assert_eq!(item.handout_url.as_deref(), Some("https://cdn/h.pdf"));
    }

    #[test]
    fn test_program_round_trip_str() {
        for program in Program::ALL {
            assert_eq!(program.as_str().parse::<Program>().unwrap(), program);
        }
        assert!("aap".parse::<Program>().is_err());
    }

    #[test]
    fn test_asset_urls() {
        let item = item();
        assert_eq!(item.asset_urls().collect::<Vec<_>>(), vec!["https://cdn/p.png"]);
    }
}
