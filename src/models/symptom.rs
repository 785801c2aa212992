use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use thiserror::Error;

use super::{cycle::Cycle, dates};

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 5;
pub const DEFAULT_SEVERITY: u8 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SymptomCategory {
    #[default]
    Physical,
    Emotional,
    Behavioral,
    Menstrual,
}

impl SymptomCategory {
    pub const ALL: [SymptomCategory; 4] = [
        SymptomCategory::Physical,
        SymptomCategory::Emotional,
        SymptomCategory::Behavioral,
        SymptomCategory::Menstrual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymptomCategory::Physical => "Physical",
            SymptomCategory::Emotional => "Emotional",
            SymptomCategory::Behavioral => "Behavioral",
            SymptomCategory::Menstrual => "Menstrual",
        }
    }

    pub fn types(&self) -> &'static [&'static str] {
        match self {
            SymptomCategory::Physical => &[
                "Cramps",
                "Headache",
                "Back pain",
                "Breast tenderness",
                "Bloating",
                "Fatigue",
                "Acne",
            ],
            SymptomCategory::Emotional => &[
                "Mood swings",
                "Irritability",
                "Anxiety",
                "Depression",
                "Low motivation",
            ],
            SymptomCategory::Behavioral => &[
                "Appetite change",
                "Sleep disturbance",
                "Energy level",
                "Libido fluctuation",
            ],
            SymptomCategory::Menstrual => &["Flow intensity", "Duration", "Spotting"],
        }
    }

    pub fn default_type(&self) -> &'static str {
        self.types()[0]
    }
}

impl fmt::Display for SymptomCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Symptom {
    pub id: i64,
    #[serde(deserialize_with = "dates::date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub category: Option<SymptomCategory>,
    #[serde(default)]
    pub symptom_type: String,
    #[serde(default = "default_severity")]
    pub severity: u8,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_severity() -> u8 {
    DEFAULT_SEVERITY
}

impl Symptom {
    pub fn category(&self) -> SymptomCategory {
        self.category.unwrap_or_default()
    }

    pub fn notes_display(&self) -> &str {
        self.notes.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SymptomPayload {
    pub date: NaiveDate,
    pub category: SymptomCategory,
    pub symptom_type: String,
    pub severity: u8,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymptomFormError {
    #[error("Date required")]
    MissingDate,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct SymptomForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: SymptomCategory,
    #[serde(default)]
    pub symptom_type: String,
    #[serde(default = "default_severity")]
    pub severity: u8,
    #[serde(default)]
    pub notes: String,
}

impl Default for SymptomForm {
    fn default() -> Self {
        Self {
            date: None,
            category: SymptomCategory::Physical,
            symptom_type: SymptomCategory::Physical.default_type().to_string(),
            severity: DEFAULT_SEVERITY,
            notes: String::new(),
        }
    }
}

impl SymptomForm {
    pub fn from_symptom(symptom: &Symptom) -> Self {
        Self {
            date: Some(symptom.date.to_string()),
            category: symptom.category(),
            symptom_type: symptom.symptom_type.clone(),
            severity: symptom.severity,
            notes: symptom.notes.clone().unwrap_or_default(),
        }
    }

    /// Severity is clamped into 1..=5 and a type outside the chosen category
    /// falls back to the category's first type.
    pub fn validate(&self) -> Result<SymptomPayload, SymptomFormError> {
        let raw = self
            .date
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SymptomFormError::MissingDate)?;
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| SymptomFormError::InvalidDate(raw.to_string()))?;
        let symptom_type = if self.category.types().contains(&self.symptom_type.as_str()) {
            self.symptom_type.clone()
        } else {
            self.category.default_type().to_string()
        };
        Ok(SymptomPayload {
            date,
            category: self.category,
            symptom_type,
            severity: self.severity.clamp(MIN_SEVERITY, MAX_SEVERITY),
            notes: self.notes.trim().to_string(),
        })
    }

    /// Form state after a successful create: keep date and category, reset
    /// the type and notes.
    pub fn after_submit(&self) -> Self {
        Self {
            symptom_type: self.category.default_type().to_string(),
            notes: String::new(),
            ..self.clone()
        }
    }

    pub fn date_value(&self) -> &str {
        self.date.as_deref().unwrap_or("")
    }

    pub fn is_category(&self, category: &SymptomCategory) -> bool {
        self.category == *category
    }

    pub fn is_severity(&self, level: &u8) -> bool {
        self.severity == *level
    }

    pub fn is_type(&self, symptom_type: &str) -> bool {
        self.symptom_type == symptom_type
    }
}

#[derive(Debug, Clone)]
pub struct CycleSymptoms {
    pub cycle: Cycle,
    pub symptoms: Vec<Symptom>,
}

/// Symptoms grouped under the two most recent cycles.
pub fn group_by_recent_cycles(symptoms: &[Symptom], cycles: &[Cycle]) -> Vec<CycleSymptoms> {
    let mut latest: Vec<&Cycle> = cycles.iter().collect();
    latest.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    latest
        .into_iter()
        .take(2)
        .map(|cycle| CycleSymptoms {
            cycle: cycle.clone(),
            symptoms: symptoms
                .iter()
                .filter(|s| cycle.contains(s.date))
                .cloned()
                .collect(),
        })
        .collect()
}
