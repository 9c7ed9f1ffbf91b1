pub mod admin_service;
pub mod catalog_service;
pub mod registration_service;
pub mod roster_service;

pub use admin_service::AdminService;
pub use catalog_service::{AssetKind, CatalogForm, CatalogService, DeleteOutcome, Upload};
pub use registration_service::{normalize_phone, RegistrationService, UserDashboard};
pub use roster_service::{AdminDashboard, RosterService, UserPage};
