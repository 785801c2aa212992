use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use thiserror::Error;

use super::dates;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowIntensity {
    #[serde(alias = "Light")]
    Light,
    #[default]
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "Heavy")]
    Heavy,
    #[serde(alias = "Spotting")]
    Spotting,
}

impl FlowIntensity {
    pub const ALL: [FlowIntensity; 4] = [
        FlowIntensity::Light,
        FlowIntensity::Medium,
        FlowIntensity::Heavy,
        FlowIntensity::Spotting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowIntensity::Light => "light",
            FlowIntensity::Medium => "medium",
            FlowIntensity::Heavy => "heavy",
            FlowIntensity::Spotting => "spotting",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlowIntensity::Light => "Light",
            FlowIntensity::Medium => "Medium",
            FlowIntensity::Heavy => "Heavy",
            FlowIntensity::Spotting => "Spotting",
        }
    }
}

impl fmt::Display for FlowIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cycle {
    pub id: i64,
    #[serde(deserialize_with = "dates::date")]
    pub start_date: NaiveDate,
    #[serde(default, deserialize_with = "dates::option_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub flow_intensity: Option<FlowIntensity>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Cycle {
    /// Inclusive length in days; open cycles have none.
    pub fn duration_days(&self) -> Option<i64> {
        self.end_date
            .map(|end| (end - self.start_date).num_days() + 1)
    }

    pub fn duration_text(&self) -> String {
        match self.duration_days() {
            Some(1) => "1 day".into(),
            Some(days) => format!("{days} days"),
            None => "ongoing".into(),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start_date && self.end_date.map_or(true, |end| day <= end)
    }

    pub fn flow(&self) -> FlowIntensity {
        self.flow_intensity.unwrap_or_default()
    }

    pub fn end_text(&self) -> String {
        self.end_date
            .map(|end| end.to_string())
            .unwrap_or_else(|| "ongoing".into())
    }

    pub fn notes_display(&self) -> &str {
        self.notes.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CyclePayload {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub flow_intensity: FlowIntensity,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleFormError {
    #[error("Start date required")]
    MissingStartDate,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("End date cannot be before start date.")]
    EndBeforeStart,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CycleForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub flow_intensity: FlowIntensity,
    #[serde(default)]
    pub notes: String,
}

impl CycleForm {
    pub fn from_cycle(cycle: &Cycle) -> Self {
        Self {
            start_date: Some(cycle.start_date.to_string()),
            end_date: cycle.end_date.map(|end| end.to_string()),
            flow_intensity: cycle.flow(),
            notes: cycle.notes.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<CyclePayload, CycleFormError> {
        let start_date = parse_form_date(self.start_date.as_deref())?
            .ok_or(CycleFormError::MissingStartDate)?;
        let end_date = parse_form_date(self.end_date.as_deref())?;
        if end_date.is_some_and(|end| end < start_date) {
            return Err(CycleFormError::EndBeforeStart);
        }
        Ok(CyclePayload {
            start_date,
            end_date,
            flow_intensity: self.flow_intensity,
            notes: self.notes.trim().to_string(),
        })
    }

    pub fn start_value(&self) -> &str {
        self.start_date.as_deref().unwrap_or("")
    }

    pub fn end_value(&self) -> &str {
        self.end_date.as_deref().unwrap_or("")
    }

    pub fn is_flow(&self, flow: &FlowIntensity) -> bool {
        self.flow_intensity == *flow
    }
}

fn parse_form_date(raw: Option<&str>) -> Result<Option<NaiveDate>, CycleFormError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| CycleFormError::InvalidDate(value.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationPoint {
    pub date: NaiveDate,
    pub label: String,
    pub days: i64,
}

/// Period lengths of closed cycles in start-date order.
#[derive(Debug, Clone, Default)]
pub struct DurationChart {
    pub points: Vec<DurationPoint>,
}

impl DurationChart {
    pub fn from_cycles(cycles: &[Cycle]) -> Self {
        let mut closed: Vec<&Cycle> = cycles.iter().filter(|c| c.end_date.is_some()).collect();
        closed.sort_by_key(|c| c.start_date);
        let points = closed
            .into_iter()
            .filter_map(|cycle| {
                let days = cycle.duration_days()?;
                Some(DurationPoint {
                    date: cycle.start_date,
                    label: format!("{} - {}", cycle.start_date, cycle.end_text()),
                    days,
                })
            })
            .collect();
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Axis top: at least ten days, otherwise two above the longest period.
    pub fn scale(&self) -> i64 {
        let longest = self.points.iter().map(|p| p.days).max().unwrap_or(0);
        (longest + 2).max(10)
    }

    pub fn width(&self, point: &DurationPoint) -> i64 {
        (point.days.max(0) * 100) / self.scale()
    }
}
