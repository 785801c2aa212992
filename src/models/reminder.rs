use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use thiserror::Error;

use super::dates;

pub const DEFAULT_TIME: &str = "09:00";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub const ALL: [Frequency; 3] = [Frequency::Daily, Frequency::Weekly, Frequency::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ReminderCategory {
    #[default]
    Menstrual,
    General,
    #[serde(rename = "Mental Health")]
    MentalHealth,
    Fertility,
}

impl ReminderCategory {
    pub const ALL: [ReminderCategory; 4] = [
        ReminderCategory::Menstrual,
        ReminderCategory::General,
        ReminderCategory::MentalHealth,
        ReminderCategory::Fertility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderCategory::Menstrual => "Menstrual",
            ReminderCategory::General => "General",
            ReminderCategory::MentalHealth => "Mental Health",
            ReminderCategory::Fertility => "Fertility",
        }
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationReminder {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default, deserialize_with = "dates::option_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "dates::option_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<ReminderCategory>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MedicationReminder {
    pub fn category(&self) -> ReminderCategory {
        self.category.unwrap_or_default()
    }

    pub fn date_range(&self) -> String {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!("{start} – {end}"),
            (Some(start), None) => format!("from {start}"),
            (None, Some(end)) => format!("until {end}"),
            (None, None) => String::new(),
        }
    }

    pub fn tags_text(&self) -> String {
        self.tags.join(", ")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReminderPayload {
    pub name: String,
    pub dosage: String,
    pub time: String,
    pub frequency: Frequency,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: ReminderCategory,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReminderFormError {
    #[error("Name required")]
    MissingName,
    #[error("Invalid time: {0}")]
    InvalidTime(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("End date cannot be before start date.")]
    EndBeforeStart,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub category: ReminderCategory,
    #[serde(default)]
    pub tags: String,
}

fn default_time() -> String {
    DEFAULT_TIME.to_string()
}

impl Default for ReminderForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            dosage: String::new(),
            time: default_time(),
            frequency: Frequency::Daily,
            start_date: None,
            end_date: None,
            category: ReminderCategory::Menstrual,
            tags: String::new(),
        }
    }
}

impl ReminderForm {
    pub fn from_reminder(reminder: &MedicationReminder) -> Self {
        Self {
            name: reminder.name.clone(),
            dosage: reminder.dosage.clone(),
            time: if reminder.time.is_empty() {
                default_time()
            } else {
                reminder.time.clone()
            },
            frequency: reminder.frequency,
            start_date: reminder.start_date.map(|d| d.to_string()),
            end_date: reminder.end_date.map(|d| d.to_string()),
            category: reminder.category(),
            tags: reminder.tags_text(),
        }
    }

    pub fn validate(&self) -> Result<ReminderPayload, ReminderFormError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ReminderFormError::MissingName);
        }
        let time = self.time.trim();
        NaiveTime::parse_from_str(time, "%H:%M")
            .map_err(|_| ReminderFormError::InvalidTime(time.to_string()))?;
        let start_date = parse_form_date(self.start_date.as_deref())?;
        let end_date = parse_form_date(self.end_date.as_deref())?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(ReminderFormError::EndBeforeStart);
            }
        }
        Ok(ReminderPayload {
            name: name.to_string(),
            dosage: self.dosage.trim().to_string(),
            time: time.to_string(),
            frequency: self.frequency,
            start_date,
            end_date,
            category: self.category,
            tags: split_tags(&self.tags),
        })
    }

    pub fn start_value(&self) -> &str {
        self.start_date.as_deref().unwrap_or("")
    }

    pub fn end_value(&self) -> &str {
        self.end_date.as_deref().unwrap_or("")
    }

    pub fn is_frequency(&self, frequency: &Frequency) -> bool {
        self.frequency == *frequency
    }

    pub fn is_category(&self, category: &ReminderCategory) -> bool {
        self.category == *category
    }
}

fn parse_form_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ReminderFormError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ReminderFormError::InvalidDate(value.to_string())),
    }
}

pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
