use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Semester {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
}

impl Semester {
    pub fn as_str(self) -> &'static str {
        match self {
            Semester::First => "1st",
            Semester::Second => "2nd",
        }
    }

    /// Periods graded in this semester. Only the 2nd semester runs a P3.
    pub fn periods(self) -> &'static [Period] {
        match self {
            Semester::First => &[Period::P1, Period::P2],
            Semester::Second => &[Period::P1, Period::P2, Period::P3],
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Semester {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1st" | "1" | "first" => Ok(Semester::First),
            "2nd" | "2" | "second" => Ok(Semester::Second),
            other => anyhow::bail!("unknown semester '{other}' (expected 1st or 2nd)"),
        }
    }
}

pub const FACULTY_NO: &str = "FacultyNo";
pub const FACULTY_NAME: &str = "FacultyName";
pub const ENROLLED_STUDENTS: &str = "EnrolledStudents";

pub fn failed_column(period: Period) -> String {
    format!("{period}_Failed")
}

pub fn percent_column(period: Period) -> String {
    format!("{period}_Percent")
}

pub fn category_column(period: Period) -> String {
    format!("{period}_Category")
}

pub fn header(semester: Semester) -> Vec<String> {
    let mut columns = vec![
        FACULTY_NO.to_string(),
        FACULTY_NAME.to_string(),
        ENROLLED_STUDENTS.to_string(),
    ];
    for period in semester.periods() {
        columns.push(failed_column(*period));
        columns.push(percent_column(*period));
        columns.push(category_column(*period));
    }
    columns
}

/// Header-only CSV users fill in before uploading.
pub fn render(semester: Semester) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header(semester))?;
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn file_name(semester: Semester) -> String {
    format!("teacher_template_{semester}_semester.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_semester_omits_p3_columns() {
        let csv = render(Semester::First).unwrap();
        assert_eq!(
            csv,
            "FacultyNo,FacultyName,EnrolledStudents,P1_Failed,P1_Percent,P1_Category,\
             P2_Failed,P2_Percent,P2_Category\n"
        );
        assert!(!csv.contains("P3_"));
    }

    #[test]
    fn second_semester_adds_p3_columns() {
        let columns = header(Semester::Second);
        assert_eq!(columns.len(), 12);
        assert_eq!(&columns[9..], &["P3_Failed", "P3_Percent", "P3_Category"]);
    }

    #[test]
    fn semester_parses_common_spellings() {
        assert_eq!("1st".parse::<Semester>().unwrap(), Semester::First);
        assert_eq!("Second".parse::<Semester>().unwrap(), Semester::Second);
        assert!("3rd".parse::<Semester>().is_err());
        assert_eq!(file_name(Semester::Second), "teacher_template_2nd_semester.csv");
    }
}
