use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use csv::{QuoteStyle, WriterBuilder};

use super::RosterEntry;
use crate::error::{AppError, AppResult};
use crate::models::{Program, RegistrationJoinRow};

/// One output column: its header and how to read the field from a row.
pub struct CsvColumn<R> {
    pub header: &'static str,
    pub value: fn(&R) -> String,
}

impl<R> CsvColumn<R> {
    pub fn new(header: &'static str, value: fn(&R) -> String) -> Self {
        Self { header, value }
    }
}

fn or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Columns of the per-user export for a program.
pub fn grouped_columns(program: Program) -> Vec<CsvColumn<RosterEntry>> {
    let (items_header, total_header) = match program {
        Program::Courses => ("courses_registered", "total_courses"),
        Program::TechWeekend => ("events_registered", "total_events"),
    };
    vec![
        CsvColumn::new("email", |e: &RosterEntry| e.email.clone()),
        CsvColumn::new("display_name", |e: &RosterEntry| or_empty(&e.display_name)),
        CsvColumn::new("phone_number", |e: &RosterEntry| or_empty(&e.phone_number)),
        CsvColumn::new(items_header, |e: &RosterEntry| e.items_registered.clone()),
        CsvColumn::new(total_header, |e: &RosterEntry| e.total_items.to_string()),
    ]
}

/// Columns of the export for a single course or event.
pub fn member_columns() -> Vec<CsvColumn<RegistrationJoinRow>> {
    vec![
        CsvColumn::new("email", |r: &RegistrationJoinRow| r.email.clone()),
        CsvColumn::new("display_name", |r: &RegistrationJoinRow| {
            or_empty(&r.display_name)
        }),
        CsvColumn::new("phone_number", |r: &RegistrationJoinRow| {
            or_empty(&r.phone_number)
        }),
    ]
}

/// Render `rows` with every field quoted. No rows gives a header-only document.
pub fn to_csv<R>(rows: &[R], columns: &[CsvColumn<R>]) -> AppResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    writer
        .write_record(columns.iter().map(|c| c.header))
        .map_err(|e| AppError::Internal(format!("csv header: {}", e)))?;
    for row in rows {
        writer
            .write_record(columns.iter().map(|c| (c.value)(row)))
            .map_err(|e| AppError::Internal(format!("csv row: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv flush: {}", e)))
}

/// A CSV document served as a file download.
#[derive(Debug)]
pub struct CsvDownload {
    pub filename: String,
    pub body: Vec<u8>,
}

impl IntoResponse for CsvDownload {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename);
        let disposition = match HeaderValue::from_str(&disposition) {
            Ok(value) => value,
            Err(_) => {
                return AppError::Internal(format!("bad csv filename {}", self.filename))
                    .into_response()
            }
        };
        (
            StatusCode::OK,
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/csv; charset=utf-8"),
                ),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.body,
        )
            .into_response()
    }
}
