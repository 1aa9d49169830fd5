use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Risk tier assigned to a teacher record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Green, Zone::Yellow, Zone::Red];

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Green => "green",
            Zone::Yellow => "yellow",
            Zone::Red => "red",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Zone::Green),
            "yellow" => Ok(Zone::Yellow),
            "red" => Ok(Zone::Red),
            other => anyhow::bail!("unknown zone '{other}' (expected green, yellow or red)"),
        }
    }
}

/// Evaluation window within an academic term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Period {
    P1,
    P2,
    P3,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::P1, Period::P2, Period::P3];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::P1 => "P1",
            Period::P2 => "P2",
            Period::P3 => "P3",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P1" | "1" => Ok(Period::P1),
            "P2" | "2" => Ok(Period::P2),
            "P3" | "3" => Ok(Period::P3),
            other => anyhow::bail!("unknown period '{other}' (expected P1, P2 or P3)"),
        }
    }
}

/// Raw per-period figures as stored on a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub failed: Option<i32>,
    pub percent: Option<f64>,
    pub category: Option<String>,
}

impl PeriodMetrics {
    pub fn is_empty(&self) -> bool {
        self.failed.is_none() && self.percent.is_none() && self.category.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: Uuid,
    pub teacher_id: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub department: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub notes: String,
    pub enrolled_students: i32,
    pub p1_failed: Option<i32>,
    pub p1_percent: Option<f64>,
    pub p1_category: Option<String>,
    pub p2_failed: Option<i32>,
    pub p2_percent: Option<f64>,
    pub p2_category: Option<String>,
    pub p3_failed: Option<i32>,
    pub p3_percent: Option<f64>,
    pub p3_category: Option<String>,
    pub zone: Option<Zone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Teacher {
    /// Builds a stored record from validated form input.
    pub fn from_input(id: Uuid, input: TeacherInput, now: DateTime<Utc>) -> Self {
        let mut teacher = Teacher {
            id,
            teacher_id: String::new(),
            first_name: String::new(),
            middle_name: None,
            last_name: String::new(),
            department: String::new(),
            position: String::new(),
            status: String::new(),
            notes: String::new(),
            enrolled_students: 0,
            p1_failed: None,
            p1_percent: None,
            p1_category: None,
            p2_failed: None,
            p2_percent: None,
            p2_category: None,
            p3_failed: None,
            p3_percent: None,
            p3_category: None,
            zone: None,
            created_at: now,
            updated_at: now,
        };
        teacher.apply(input, now);
        teacher
    }

    /// Overwrites every editable field with the given input.
    pub fn apply(&mut self, input: TeacherInput, now: DateTime<Utc>) {
        for period in Period::ALL {
            self.set_metrics(period, input.metrics(period));
        }
        self.teacher_id = input.teacher_id;
        self.first_name = input.first_name;
        self.middle_name = input.middle_name.filter(|m| !m.trim().is_empty());
        self.last_name = input.last_name;
        self.department = input.department;
        self.position = input.position;
        self.status = input.status;
        self.notes = input.notes;
        self.enrolled_students = input.enrolled_students;
        self.zone = input.zone;
        self.updated_at = now;
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn metrics(&self, period: Period) -> PeriodMetrics {
        match period {
            Period::P1 => PeriodMetrics {
                failed: self.p1_failed,
                percent: self.p1_percent,
                category: self.p1_category.clone(),
            },
            Period::P2 => PeriodMetrics {
                failed: self.p2_failed,
                percent: self.p2_percent,
                category: self.p2_category.clone(),
            },
            Period::P3 => PeriodMetrics {
                failed: self.p3_failed,
                percent: self.p3_percent,
                category: self.p3_category.clone(),
            },
        }
    }

    pub fn set_metrics(&mut self, period: Period, metrics: PeriodMetrics) {
        let (failed, percent, category) = match period {
            Period::P1 => (&mut self.p1_failed, &mut self.p1_percent, &mut self.p1_category),
            Period::P2 => (&mut self.p2_failed, &mut self.p2_percent, &mut self.p2_category),
            Period::P3 => (&mut self.p3_failed, &mut self.p3_percent, &mut self.p3_category),
        };
        *failed = metrics.failed;
        *percent = metrics.percent;
        *category = metrics.category.filter(|c| !c.trim().is_empty());
    }
}

/// Create/update payload accepted by the API, the CLI import and the CSV upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeacherInput {
    pub teacher_id: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub department: String,
    pub position: String,
    pub status: String,
    pub notes: String,
    pub enrolled_students: i32,
    pub p1_failed: Option<i32>,
    pub p1_percent: Option<f64>,
    pub p1_category: Option<String>,
    pub p2_failed: Option<i32>,
    pub p2_percent: Option<f64>,
    pub p2_category: Option<String>,
    pub p3_failed: Option<i32>,
    pub p3_percent: Option<f64>,
    pub p3_category: Option<String>,
    pub zone: Option<Zone>,
}

impl TeacherInput {
    pub fn metrics(&self, period: Period) -> PeriodMetrics {
        match period {
            Period::P1 => PeriodMetrics {
                failed: self.p1_failed,
                percent: self.p1_percent,
                category: self.p1_category.clone(),
            },
            Period::P2 => PeriodMetrics {
                failed: self.p2_failed,
                percent: self.p2_percent,
                category: self.p2_category.clone(),
            },
            Period::P3 => PeriodMetrics {
                failed: self.p3_failed,
                percent: self.p3_percent,
                category: self.p3_category.clone(),
            },
        }
    }

    pub fn set_metrics(&mut self, period: Period, metrics: PeriodMetrics) {
        let (failed, percent, category) = match period {
            Period::P1 => (&mut self.p1_failed, &mut self.p1_percent, &mut self.p1_category),
            Period::P2 => (&mut self.p2_failed, &mut self.p2_percent, &mut self.p2_category),
            Period::P3 => (&mut self.p3_failed, &mut self.p3_percent, &mut self.p3_category),
        };
        *failed = metrics.failed;
        *percent = metrics.percent;
        *category = metrics.category;
    }

    /// Checks the add/edit form: identity, name and department are required
    /// and the figures must be consistent.
    pub fn validate(&self) -> Result<(), String> {
        let mut problems = Vec::new();
        for (field, value) in [
            ("teacher_id", &self.teacher_id),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("department", &self.department),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} is required"));
            }
        }
        if let Err(figures) = self.validate_figures() {
            problems.push(figures);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    pub fn validate_figures(&self) -> Result<(), String> {
        let mut problems = Vec::new();
        if self.enrolled_students < 0 {
            problems.push("enrolled_students must not be negative".to_string());
        }
        for period in Period::ALL {
            let metrics = self.metrics(period);
            if let Some(failed) = metrics.failed {
                if failed < 0 {
                    problems.push(format!("{period} failed must not be negative"));
                } else if failed > self.enrolled_students && self.enrolled_students > 0 {
                    problems.push(format!(
                        "{period} failed ({failed}) exceeds enrolled students ({})",
                        self.enrolled_students
                    ));
                }
            }
            if let Some(percent) = metrics.percent {
                if !percent.is_finite() || percent < 0.0 {
                    problems.push(format!("{period} percent must be a non-negative number"));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}
