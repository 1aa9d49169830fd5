use std::path::Path;

use thiserror::Error;

use crate::models::{Period, PeriodMetrics, TeacherInput};
use crate::template::{self, Semester};
use crate::zone;

pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "text/csv",
    "application/csv",
    "application/vnd.ms-excel",
    "text/plain",
];

pub const UNSUPPORTED_TYPE_INSTRUCTIONS: &str = "Only .csv files are accepted. In Excel or \
     Google Sheets use File > Save As (or Download) and choose \"CSV (Comma delimited)\", \
     then upload the saved .csv file. Download the template to see the expected columns.";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },
    #[error("file is not valid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("file contains no data rows")]
    Empty,
}

/// Accepts `.csv` names whose declared MIME type (if any) is a CSV-ish type.
pub fn check_file(file_name: &str, content_type: Option<&str>) -> Result<(), UploadError> {
    let is_csv_name = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv_name {
        return Err(UploadError::UnsupportedType(file_name.to_string()));
    }

    let mime = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match mime {
        None => Ok(()),
        Some(mime) if mime == "application/octet-stream" => Ok(()),
        Some(mime) if ACCEPTED_MIME_TYPES.contains(&mime.as_str()) => Ok(()),
        Some(mime) => Err(UploadError::UnsupportedType(mime)),
    }
}

/// Splits `Last, First Middle` or `First [Middle...] Last` into name parts.
pub fn split_name(raw: &str) -> (String, Option<String>, String) {
    let raw = raw.trim();
    if let Some((last, rest)) = raw.split_once(',') {
        let mut given = rest.split_whitespace();
        let first = given.next().unwrap_or_default().to_string();
        let middle = given.collect::<Vec<_>>().join(" ");
        let middle = (!middle.is_empty()).then_some(middle);
        return (first, middle, last.trim().to_string());
    }

    let parts: Vec<&str> = raw.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), None, String::new()),
        [only] => (only.to_string(), None, String::new()),
        [first, last] => (first.to_string(), None, last.to_string()),
        [first, middle @ .., last] => (first.to_string(), Some(middle.join(" ")), last.to_string()),
    }
}

struct Columns {
    faculty_no: usize,
    faculty_name: usize,
    enrolled: usize,
    department: Option<usize>,
    position: Option<usize>,
    status: Option<usize>,
    periods: Vec<(Period, Option<usize>, Option<usize>, Option<usize>)>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord, semester: Semester) -> Result<Self, UploadError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &'static str| find(name).ok_or(UploadError::MissingColumn(name));

        let periods = semester
            .periods()
            .iter()
            .map(|period| {
                (
                    *period,
                    find(&template::failed_column(*period)),
                    find(&template::percent_column(*period)),
                    find(&template::category_column(*period)),
                )
            })
            .collect();

        Ok(Columns {
            faculty_no: required(template::FACULTY_NO)?,
            faculty_name: required(template::FACULTY_NAME)?,
            enrolled: required(template::ENROLLED_STUDENTS)?,
            department: find("Department"),
            position: find("Position"),
            status: find("Status"),
            periods,
        })
    }
}

fn cell(record: &csv::StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_count(value: Option<&str>, column: &str) -> Result<Option<i32>, String> {
    value
        .map(|raw| {
            raw.parse::<i32>()
                .map_err(|_| format!("{column} must be a whole number, got '{raw}'"))
        })
        .transpose()
}

fn parse_percent(value: Option<&str>, column: &str) -> Result<Option<f64>, String> {
    value
        .map(|raw| {
            raw.trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("{column} must be a number, got '{raw}'"))
        })
        .transpose()
}

fn parse_row(record: &csv::StringRecord, columns: &Columns) -> Result<TeacherInput, String> {
    let teacher_id = cell(record, Some(columns.faculty_no))
        .ok_or_else(|| format!("{} is required", template::FACULTY_NO))?
        .to_string();
    let (first_name, middle_name, last_name) =
        split_name(cell(record, Some(columns.faculty_name)).unwrap_or_default());
    if first_name.is_empty() || last_name.is_empty() {
        return Err(format!(
            "{} must include a first and last name",
            template::FACULTY_NAME
        ));
    }
    let enrolled_students =
        parse_count(cell(record, Some(columns.enrolled)), template::ENROLLED_STUDENTS)?
            .unwrap_or(0);

    let mut input = TeacherInput {
        teacher_id,
        first_name,
        middle_name,
        last_name,
        department: cell(record, columns.department).unwrap_or_default().to_string(),
        position: cell(record, columns.position).unwrap_or_default().to_string(),
        status: cell(record, columns.status).unwrap_or_default().to_string(),
        enrolled_students,
        ..TeacherInput::default()
    };

    for (period, failed, percent, category) in &columns.periods {
        let metrics = PeriodMetrics {
            failed: parse_count(cell(record, *failed), &template::failed_column(*period))?,
            percent: parse_percent(cell(record, *percent), &template::percent_column(*period))?,
            category: cell(record, *category).map(str::to_string),
        };
        input.set_metrics(*period, metrics);
    }

    // The template has no Department column, so rows are held to the form's
    // identity and figure rules but not its department requirement.
    input.validate_figures()?;
    zone::precompute(&mut input);
    input.zone = zone::latest_zone(&input);
    Ok(input)
}

/// Parses an uploaded sheet into records ready for import. Periods outside
/// the semester are ignored even when their columns are present.
pub fn parse_csv(bytes: &[u8], semester: Semester) -> Result<Vec<TeacherInput>, UploadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();
    let columns = Columns::locate(&headers, semester)?;

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        // Row numbers as seen in a spreadsheet: the header is row 1.
        let row = index + 2;
        let input =
            parse_row(&record, &columns).map_err(|message| UploadError::InvalidRow { row, message })?;
        rows.push(input);
    }

    if rows.is_empty() {
        return Err(UploadError::Empty);
    }
    Ok(rows)
}

pub fn parse_file(path: &Path, semester: Semester) -> anyhow::Result<Vec<TeacherInput>> {
    let bytes = std::fs::read(path)?;
    Ok(parse_csv(&bytes, semester)?)
}
