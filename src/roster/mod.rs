//! Roster views over registrations: grouping by user, paging, CSV export.

pub mod aggregate;
pub mod csv_export;
pub mod paginate;

pub use aggregate::{aggregate, sort_members, RosterEntry};
pub use csv_export::{grouped_columns, member_columns, to_csv, CsvColumn, CsvDownload};
pub use paginate::{paginate, PageQuery, Pagination, DEFAULT_LIMIT, MAX_LIMIT};
