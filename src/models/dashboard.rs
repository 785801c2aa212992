use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{
    cycle::{Cycle, DurationChart},
    insights::{Insights, InsightsSummary, Predictions},
};

/// `GET /dashboard` payload. Older service versions send symptoms and
/// insights as bare strings, so both lists accept either shape.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub cycle_length: Option<u32>,
    #[serde(default)]
    pub last_period: Option<String>,
    #[serde(default)]
    pub next_period: Option<String>,
    #[serde(default)]
    pub ovulation_period: Option<String>,
    #[serde(default)]
    pub cycle_logs: Vec<Cycle>,
    #[serde(default)]
    pub symptoms: Vec<SymptomEntry>,
    #[serde(default)]
    pub reminders: Vec<ReminderBrief>,
    #[serde(default)]
    pub insights: Vec<InsightEntry>,
    #[serde(default)]
    pub insights_summary: Option<InsightsSummary>,
    #[serde(default)]
    pub insights_prediction: Option<Predictions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymptomEntry {
    Logged {
        date: String,
        #[serde(default)]
        symptom_type: Option<String>,
    },
    Text(String),
}

impl SymptomEntry {
    pub fn display(&self) -> String {
        match self {
            SymptomEntry::Logged { date, symptom_type } => {
                format!("{date}: {}", symptom_type.as_deref().unwrap_or(""))
            }
            SymptomEntry::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsightEntry {
    Text(String),
    Summary(InsightsSummary),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderBrief {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendRow {
    pub date: String,
    pub counts: Vec<usize>,
}

/// Per-date counts of each symptom type seen anywhere in the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymptomTrend {
    pub types: Vec<String>,
    pub rows: Vec<TrendRow>,
}

impl Dashboard {
    pub fn welcome_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("")
    }

    pub fn cycle_length_text(&self) -> String {
        self.cycle_length
            .map(|days| days.to_string())
            .unwrap_or_else(|| "-".into())
    }

    pub fn last_period_text(&self) -> &str {
        self.last_period.as_deref().unwrap_or("-")
    }

    pub fn next_period_text(&self) -> &str {
        self.next_period.as_deref().unwrap_or("-")
    }

    pub fn ovulation_text(&self) -> String {
        if let Some(period) = self.ovulation_period.as_deref() {
            return period.to_string();
        }
        self.insight_lines()
            .into_iter()
            .find(|line| line.to_lowercase().contains("ovulation"))
            .unwrap_or_else(|| "-".into())
    }

    pub fn insight_lines(&self) -> Vec<String> {
        self.insights
            .iter()
            .filter_map(|entry| match entry {
                InsightEntry::Text(text) => Some(text.clone()),
                InsightEntry::Summary(_) => None,
            })
            .collect()
    }

    /// The explicit summary, else the last structured entry of `insights`.
    pub fn insights(&self) -> Insights {
        let summary = self.insights_summary.clone().or_else(|| {
            self.insights.iter().rev().find_map(|entry| match entry {
                InsightEntry::Summary(summary) => Some(summary.clone()),
                InsightEntry::Text(_) => None,
            })
        });
        Insights {
            summary: summary.unwrap_or_default(),
            predictions: self.insights_prediction.clone().unwrap_or_default(),
        }
    }

    pub fn care_tips(&self, today: NaiveDate) -> Vec<&'static str> {
        self.insights().care_tips(today)
    }

    pub fn duration_chart(&self) -> DurationChart {
        DurationChart::from_cycles(&self.cycle_logs)
    }

    pub fn symptom_lines(&self) -> Vec<String> {
        self.symptoms.iter().map(SymptomEntry::display).collect()
    }

    pub fn symptom_trend(&self) -> SymptomTrend {
        let mut types: Vec<String> = Vec::new();
        let mut by_date: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for entry in &self.symptoms {
            let (date, kind) = match entry {
                SymptomEntry::Logged { date, symptom_type } => (
                    date.clone(),
                    symptom_type.clone().unwrap_or_else(|| "Other".into()),
                ),
                SymptomEntry::Text(text) => (text.clone(), text.clone()),
            };
            if matches!(entry, SymptomEntry::Logged { symptom_type: Some(_), .. })
                && !types.contains(&kind)
            {
                types.push(kind.clone());
            }
            *by_date.entry(date).or_default().entry(kind).or_default() += 1;
        }
        let rows = by_date
            .into_iter()
            .map(|(date, counts)| TrendRow {
                date,
                counts: types
                    .iter()
                    .map(|kind| counts.get(kind).copied().unwrap_or(0))
                    .collect(),
            })
            .collect();
        SymptomTrend { types, rows }
    }
}
