use std::fmt::Write;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Period, Teacher, Zone};
use crate::zone;

pub const TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntry {
    pub id: Uuid,
    pub teacher_id: String,
    pub name: String,
    pub department: String,
    pub enrolled_students: i32,
    pub failed: Option<i32>,
    pub percent: f64,
    pub category: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneDistribution {
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
}

impl ZoneDistribution {
    pub fn add(&mut self, zone: Zone) {
        match zone {
            Zone::Green => self.green += 1,
            Zone::Yellow => self.yellow += 1,
            Zone::Red => self.red += 1,
        }
    }

    pub fn get(&self, zone: Zone) -> usize {
        match zone {
            Zone::Green => self.green,
            Zone::Yellow => self.yellow,
            Zone::Red => self.red,
        }
    }

    pub fn total(&self) -> usize {
        self.green + self.yellow + self.red
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub record_count: usize,
    pub top: Vec<TopEntry>,
    pub total_enrolled: i64,
    pub total_failed: i64,
    pub distribution: ZoneDistribution,
}

/// Records with a resolvable percent for the period, highest first. Ranked
/// on the unrounded percent; entries carry the two-decimal form.
pub fn top_by_percent(teachers: &[Teacher], period: Period, limit: usize) -> Vec<TopEntry> {
    let mut ranked: Vec<(f64, TopEntry)> = teachers
        .iter()
        .filter_map(|teacher| {
            let resolution = zone::resolve(teacher, period);
            let percent = resolution.percent?;
            let entry = TopEntry {
                id: teacher.id,
                teacher_id: teacher.teacher_id.clone(),
                name: teacher.full_name(),
                department: teacher.department.clone(),
                enrolled_students: teacher.enrolled_students,
                failed: teacher.metrics(period).failed,
                percent: zone::round2(percent),
                category: resolution.label.unwrap_or_default(),
            };
            Some((percent, entry))
        })
        .collect();

    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, entry)| entry)
        .collect()
}

pub fn distribution(teachers: &[Teacher], period: Period) -> ZoneDistribution {
    let mut counts = ZoneDistribution::default();
    for teacher in teachers {
        if let Some(zone) = zone::resolve(teacher, period).zone {
            counts.add(zone);
        }
    }
    counts
}

pub fn build_period_report(teachers: &[Teacher], period: Period) -> PeriodReport {
    let total_enrolled = teachers
        .iter()
        .map(|t| i64::from(t.enrolled_students.max(0)))
        .sum();
    let total_failed = teachers
        .iter()
        .filter_map(|t| t.metrics(period).failed)
        .map(i64::from)
        .sum();

    PeriodReport {
        period,
        record_count: teachers.len(),
        top: top_by_percent(teachers, period, TOP_LIMIT),
        total_enrolled,
        total_failed,
        distribution: distribution(teachers, period),
    }
}

pub fn render_markdown(report: &PeriodReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Faculty Performance Report");
    let _ = writeln!(
        output,
        "Generated for period {} across {} records",
        report.period, report.record_count
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Enrollment");
    let overall = if report.total_enrolled > 0 {
        report.total_failed as f64 / report.total_enrolled as f64 * 100.0
    } else {
        0.0
    };
    let _ = writeln!(
        output,
        "- {} enrolled, {} failed ({:.2}%)",
        report.total_enrolled, report.total_failed, overall
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Zone Distribution");

    if report.distribution.total() == 0 {
        let _ = writeln!(output, "No classified records for this period.");
    } else {
        for zone in Zone::ALL {
            let _ = writeln!(output, "- {}: {}", zone, report.distribution.get(zone));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Failure Rates");

    if report.top.is_empty() {
        let _ = writeln!(output, "No records with a failure rate for this period.");
    } else {
        for entry in report.top.iter() {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {:.2}% {}",
                entry.name, entry.teacher_id, entry.department, entry.percent, entry.category
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::TeacherInput;

    fn teacher(id: &str, enrolled: i32, p1_failed: Option<i32>) -> Teacher {
        let input = TeacherInput {
            teacher_id: id.to_string(),
            first_name: "Test".to_string(),
            last_name: id.to_string(),
            department: "Math".to_string(),
            enrolled_students: enrolled,
            p1_failed,
            ..TeacherInput::default()
        };
        Teacher::from_input(Uuid::new_v4(), input, Utc::now())
    }

    #[test]
    fn top_is_limited_and_descending() {
        let teachers: Vec<Teacher> = (0..15)
            .map(|i| teacher(&format!("F-{i:02}"), 100, Some(i)))
            .collect();
        let top = top_by_percent(&teachers, Period::P1, TOP_LIMIT);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].teacher_id, "F-14");
        assert!(top.windows(2).all(|w| w[0].percent >= w[1].percent));
    }

    #[test]
    fn unresolvable_records_are_left_out_of_percent_aggregates() {
        let mut label_only = teacher("F-3", 0, Some(5));
        label_only.p1_category = Some("YELLOW (10.01%-40%)".to_string());
        let mut stored = teacher("F-2", 0, Some(5));
        stored.p1_percent = Some(50.0);
        let teachers = vec![teacher("F-1", 184, Some(18)), stored, label_only, teacher("F-4", 10, None)];

        let report = build_period_report(&teachers, Period::P1);
        let top_ids: Vec<&str> = report.top.iter().map(|e| e.teacher_id.as_str()).collect();
        assert_eq!(top_ids, vec!["F-2", "F-1"]);
        assert_eq!(report.top[0].category, "RED (40.01%-100%)");
        assert_eq!(report.total_enrolled, 194);
        assert_eq!(report.total_failed, 28);
        assert_eq!(
            report.distribution,
            ZoneDistribution {
                green: 1,
                yellow: 1,
                red: 1
            }
        );
    }

    #[test]
    fn top_entries_round_for_display_but_keep_the_raw_label() {
        let teachers = vec![teacher("F-1", 20001, Some(8001)), teacher("F-2", 184, Some(18))];
        let top = top_by_percent(&teachers, Period::P1, TOP_LIMIT);
        assert_eq!(top[0].teacher_id, "F-1");
        assert_eq!(top[0].percent, 40.0);
        assert_eq!(top[0].category, "RED (40.01%-100%)");
        assert_eq!(top[1].percent, 9.78);
    }

    #[test]
    fn report_changes_with_period() {
        let mut t = teacher("F-1", 50, Some(0));
        t.p2_failed = Some(30);
        let teachers = vec![t];
        assert_eq!(build_period_report(&teachers, Period::P1).distribution.green, 1);
        assert_eq!(build_period_report(&teachers, Period::P2).distribution.red, 1);
        assert_eq!(build_period_report(&teachers, Period::P3).distribution.total(), 0);
    }

    #[test]
    fn markdown_lists_sections() {
        let teachers = vec![teacher("F-1", 184, Some(18))];
        let output = render_markdown(&build_period_report(&teachers, Period::P1));
        assert!(output.contains("# Faculty Performance Report"));
        assert!(output.contains("- 184 enrolled, 18 failed (9.78%)"));
        assert!(output.contains("- green: 1"));
        assert!(output.contains("9.78% GREEN (0.01%-10%)"));

        let empty = render_markdown(&build_period_report(&[], Period::P3));
        assert!(empty.contains("No classified records for this period."));
    }
}
