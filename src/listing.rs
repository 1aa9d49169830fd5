use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Period, Teacher, Zone};
use crate::zone;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    TeacherId,
    Department,
    Position,
    Status,
    Zone,
    EnrolledStudents,
    P1Percent,
    P2Percent,
    P3Percent,
}

impl SortField {
    fn is_text(self) -> bool {
        matches!(
            self,
            SortField::Name
                | SortField::TeacherId
                | SortField::Department
                | SortField::Position
                | SortField::Status
        )
    }
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim().to_ascii_lowercase().as_str() {
            "name" => SortField::Name,
            "teacher_id" | "id" => SortField::TeacherId,
            "department" => SortField::Department,
            "position" => SortField::Position,
            "status" => SortField::Status,
            "zone" => SortField::Zone,
            "enrolled" | "enrolled_students" => SortField::EnrolledStudents,
            "p1" | "p1_percent" => SortField::P1Percent,
            "p2" | "p2_percent" => SortField::P2Percent,
            "p3" | "p3_percent" => SortField::P3Percent,
            other => anyhow::bail!("unknown sort field '{other}'"),
        };
        Ok(field)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Active column sort of the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortState {
    pub fn ascending(field: SortField) -> Self {
        SortState {
            field,
            direction: SortDirection::Asc,
        }
    }

    /// Selecting the active column flips its direction; any other column
    /// starts ascending.
    pub fn toggle(current: Option<SortState>, field: SortField) -> SortState {
        match current {
            Some(state) if state.field == field => SortState {
                field,
                direction: state.direction.flipped(),
            },
            _ => SortState::ascending(field),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub search: Option<String>,
    pub department: Option<String>,
    pub zone: Option<Zone>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Filters,
    pub sort: Option<SortState>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            filters: Filters::default(),
            sort: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: usize,
    pub next_page: usize,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn matches(teacher: &Teacher, filters: &Filters) -> bool {
    if let Some(needle) = non_blank(&filters.search) {
        let needle = needle.to_lowercase();
        let haystacks = [
            teacher.first_name.as_str(),
            teacher.last_name.as_str(),
            teacher.teacher_id.as_str(),
            teacher.department.as_str(),
        ];
        let hit = haystacks
            .iter()
            .any(|value| value.to_lowercase().contains(&needle))
            || teacher.full_name().to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }

    if let Some(department) = non_blank(&filters.department) {
        if teacher.department != department {
            return false;
        }
    }

    if let Some(status) = non_blank(&filters.status) {
        if teacher.status != status {
            return false;
        }
    }

    match filters.zone {
        Some(zone) => teacher.zone == Some(zone),
        None => true,
    }
}

pub fn filter<'a>(teachers: &'a [Teacher], filters: &Filters) -> Vec<&'a Teacher> {
    teachers
        .iter()
        .filter(|teacher| matches(teacher, filters))
        .collect()
}

fn text_key(teacher: &Teacher, field: SortField) -> String {
    let raw = match field {
        SortField::Name => teacher.full_name(),
        SortField::TeacherId => teacher.teacher_id.clone(),
        SortField::Department => teacher.department.clone(),
        SortField::Position => teacher.position.clone(),
        SortField::Status => teacher.status.clone(),
        _ => String::new(),
    };
    raw.to_lowercase()
}

fn numeric_key(teacher: &Teacher, field: SortField) -> Option<f64> {
    let period = match field {
        SortField::EnrolledStudents => return Some(f64::from(teacher.enrolled_students)),
        SortField::P1Percent => Period::P1,
        SortField::P2Percent => Period::P2,
        SortField::P3Percent => Period::P3,
        _ => return None,
    };
    zone::resolve(teacher, period).percent
}

/// Zones order by severity (Green < Yellow < Red) with unzoned records first.
fn compare(a: &Teacher, b: &Teacher, field: SortField) -> Ordering {
    if field == SortField::Zone {
        a.zone.cmp(&b.zone)
    } else if field.is_text() {
        text_key(a, field).cmp(&text_key(b, field))
    } else {
        match (numeric_key(a, field), numeric_key(b, field)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Stable sort; equal keys keep their incoming order in both directions.
pub fn sort(teachers: &mut [&Teacher], state: SortState) {
    teachers.sort_by(|a, b| {
        let ordering = compare(a, b, state.field);
        match state.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1)).max(1)
}

pub fn next_page(page: usize, total_pages: usize) -> usize {
    (page + 1).min(total_pages.max(1))
}

pub fn prev_page(page: usize) -> usize {
    page.saturating_sub(1).max(1)
}

pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(items.len());
    let slice = items.get(start..end).unwrap_or_default();

    Page {
        items: slice.to_vec(),
        page,
        page_size,
        total_items: items.len(),
        total_pages,
        has_prev: page > 1,
        has_next: page < total_pages,
        prev_page: prev_page(page),
        next_page: next_page(page, total_pages),
    }
}

/// Filter, then sort, then cut out the requested page.
pub fn query(teachers: &[Teacher], query: &ListQuery) -> Page<Teacher> {
    let mut rows = filter(teachers, &query.filters);
    if let Some(state) = query.sort {
        sort(&mut rows, state);
    }
    let owned: Vec<Teacher> = rows.into_iter().cloned().collect();
    paginate(&owned, query.page, query.page_size)
}
