use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Period, PeriodMetrics, Teacher, TeacherInput, Zone};

/// Human-readable failure category derived from a failure percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    GreenNone,
    GreenLow,
    Yellow,
    Red,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::GreenNone => "GREEN (0%)",
            Category::GreenLow => "GREEN (0.01%-10%)",
            Category::Yellow => "YELLOW (10.01%-40%)",
            Category::Red => "RED (40.01%-100%)",
        }
    }

    pub fn zone(self) -> Zone {
        match self {
            Category::GreenNone | Category::GreenLow => Zone::Green,
            Category::Yellow => Zone::Yellow,
            Category::Red => Zone::Red,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a failure percentage onto its category. Total over `f64`: anything at
/// or below zero is treated as no failures, NaN as the most severe tier.
pub fn classify(pct: f64) -> Category {
    if pct <= 0.0 {
        Category::GreenNone
    } else if pct <= 10.0 {
        Category::GreenLow
    } else if pct <= 40.0 {
        Category::Yellow
    } else {
        Category::Red
    }
}

/// `failed / enrolled * 100`, undefined when either side is missing or
/// nobody is enrolled. Unrounded; classification runs on this value.
pub fn derive_percent(failed: Option<i32>, enrolled: Option<i32>) -> Option<f64> {
    match (failed, enrolled) {
        (Some(failed), Some(enrolled)) if enrolled > 0 => {
            Some(f64::from(failed) / f64::from(enrolled) * 100.0)
        }
        _ => None,
    }
}

/// Two-decimal form used for stored and displayed percents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reads the colour from a stored category label such as `"YELLOW (10.01%-40%)"`.
pub fn zone_from_label(label: &str) -> Option<Zone> {
    let label = label.trim_start().to_ascii_uppercase();
    if label.starts_with("GREEN") {
        Some(Zone::Green)
    } else if label.starts_with("YELLOW") {
        Some(Zone::Yellow)
    } else if label.starts_with("RED") {
        Some(Zone::Red)
    } else {
        None
    }
}

/// Where a resolved percent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentSource {
    Computed,
    Stored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Unrounded percent the label was classified from.
    pub percent: Option<f64>,
    pub source: Option<PercentSource>,
    pub zone: Option<Zone>,
    pub label: Option<String>,
}

impl Resolution {
    fn unresolved() -> Self {
        Resolution {
            percent: None,
            source: None,
            zone: None,
            label: None,
        }
    }
}

/// Resolves one period of a record. A percent computed from failed/enrolled
/// wins over the stored percent; without either, the stored category label
/// decides the zone and the record carries no percent.
pub fn resolve_metrics(metrics: &PeriodMetrics, enrolled: i32) -> Resolution {
    let (percent, source) = match derive_percent(metrics.failed, Some(enrolled)) {
        Some(pct) => (Some(pct), Some(PercentSource::Computed)),
        None => match metrics.percent.filter(|p| p.is_finite()) {
            Some(pct) => (Some(pct), Some(PercentSource::Stored)),
            None => (None, None),
        },
    };

    if let Some(pct) = percent {
        let category = classify(pct);
        return Resolution {
            percent: Some(pct),
            source,
            zone: Some(category.zone()),
            label: Some(category.label().to_string()),
        };
    }

    match metrics.category.as_deref() {
        Some(label) => Resolution {
            zone: zone_from_label(label),
            label: Some(label.to_string()),
            ..Resolution::unresolved()
        },
        None => Resolution::unresolved(),
    }
}

pub fn resolve(teacher: &Teacher, period: Period) -> Resolution {
    resolve_metrics(&teacher.metrics(period), teacher.enrolled_students)
}

/// Fills in percent and category for every period whose figures are
/// derivable, leaving stored values untouched otherwise.
pub fn precompute(input: &mut TeacherInput) {
    for period in Period::ALL {
        let mut metrics = input.metrics(period);
        if let Some(pct) = derive_percent(metrics.failed, Some(input.enrolled_students)) {
            metrics.percent = Some(round2(pct));
            metrics.category = Some(classify(pct).label().to_string());
            input.set_metrics(period, metrics);
        }
    }
}

/// Zone of the latest period that carries any data.
pub fn latest_zone(input: &TeacherInput) -> Option<Zone> {
    Period::ALL
        .iter()
        .rev()
        .map(|period| input.metrics(*period))
        .find(|metrics| !metrics.is_empty())
        .and_then(|metrics| resolve_metrics(&metrics, input.enrolled_students).zone)
}
