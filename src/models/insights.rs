use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::dates;

pub const DEFAULT_CYCLE_DAYS: f64 = 28.0;
const PERIOD_DAYS_AFTER_START: i64 = 5;
const OVULATION_WINDOW_DAYS: i64 = 3;

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InsightsSummary {
    #[serde(default, deserialize_with = "dates::option_date")]
    pub next_cycle_start: Option<NaiveDate>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub average_cycle: Option<f64>,
    #[serde(default)]
    pub most_common_symptom: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Predictions {
    #[serde(default, deserialize_with = "dates::option_date")]
    pub next_cycle_start: Option<NaiveDate>,
    #[serde(default, deserialize_with = "dates::option_date")]
    pub ovulation_date: Option<NaiveDate>,
    #[serde(default)]
    pub fertile_window: Option<String>,
}

/// Summary and predictions as shown together on the insights page.
#[derive(Debug, Clone, Default)]
pub struct Insights {
    pub summary: InsightsSummary,
    pub predictions: Predictions,
}

impl Insights {
    pub fn next_period(&self) -> Option<NaiveDate> {
        self.summary
            .next_cycle_start
            .or(self.predictions.next_cycle_start)
    }

    pub fn next_period_text(&self) -> String {
        self.next_period()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into())
    }

    pub fn average_cycle_text(&self) -> String {
        match self.summary.average_cycle {
            Some(days) if days > 0.0 => format!("{} days", format_days(days)),
            _ => "Unknown".into(),
        }
    }

    pub fn most_common_symptom_text(&self) -> &str {
        self.summary
            .most_common_symptom
            .as_deref()
            .unwrap_or("None yet")
    }

    pub fn ovulation_text(&self) -> String {
        self.predictions
            .ovulation_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Ovulation: -".into())
    }

    pub fn fertile_window_text(&self) -> String {
        self.predictions
            .fertile_window
            .as_deref()
            .map(|window| format!("Fertile window: {window}"))
            .unwrap_or_default()
    }

    pub fn care_tips(&self, today: NaiveDate) -> Vec<&'static str> {
        care_tips(
            self.next_period(),
            self.predictions.ovulation_date,
            self.summary.average_cycle,
            today,
        )
    }
}

fn format_days(days: f64) -> String {
    if days.fract() == 0.0 {
        format!("{days:.0}")
    } else {
        format!("{days:.1}")
    }
}

/// Phase-dependent advice. Checked in order: period starts today, inside the
/// five days after the start, within three days of ovulation, in the second
/// half of the cycle before the next period, otherwise general advice.
pub fn care_tips(
    next_period: Option<NaiveDate>,
    ovulation: Option<NaiveDate>,
    average_cycle: Option<f64>,
    today: NaiveDate,
) -> Vec<&'static str> {
    let average_cycle = average_cycle
        .filter(|days| *days > 0.0)
        .unwrap_or(DEFAULT_CYCLE_DAYS);

    if next_period == Some(today) {
        return vec![
            "Your period is predicted to start today. Prepare pads/tampons/cups and rest as needed.",
            "Track your flow and symptoms for better predictions next month.",
        ];
    }
    if let Some(next) = next_period {
        if today > next && today <= next + Duration::days(PERIOD_DAYS_AFTER_START) {
            return vec![
                "You are in your period. Hydrate, rest, and use heat pads for cramps.",
                "Monitor flow and consider iron-rich foods if heavy.",
            ];
        }
    }
    if let Some(ovulation) = ovulation {
        if (today - ovulation).num_days().abs() < OVULATION_WINDOW_DAYS {
            return vec![
                "You are near ovulation. You may feel energetic or have mild discomfort.",
                "Fertile window: consider contraception or conception planning.",
                "Track cervical fluid and BBT for more accurate predictions.",
            ];
        }
    }
    if let Some(next) = next_period {
        if today < next && ((next - today).num_days() as f64) < average_cycle / 2.0 {
            return vec![
                "PMS may occur: mood changes, bloating, or cravings.",
                "Magnesium-rich foods and gentle exercise can help.",
            ];
        }
    }
    vec![
        "Hydrate, rest, and keep tracking your cycles and symptoms.",
        "Eat a balanced diet and get enough sleep.",
    ]
}
