use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::dates;

/// How close to "now" an unread item's schedule must be to pop the due alert.
pub const DUE_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "dates::option_timestamp")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::option_timestamp")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_read: bool,
}

impl Notification {
    pub fn headline(&self) -> &str {
        non_empty(self.title.as_deref())
            .or_else(|| non_empty(self.message.as_deref()))
            .unwrap_or("Notification")
    }

    /// Body for the alert dialog, which prefers the message over the title.
    pub fn alert_text(&self) -> &str {
        non_empty(self.message.as_deref())
            .or_else(|| non_empty(self.title.as_deref()))
            .unwrap_or("Notification")
    }

    pub fn when(&self) -> Option<DateTime<Utc>> {
        self.scheduled_for.or(self.sent_at)
    }

    pub fn when_text(&self) -> String {
        self.when()
            .map(|ts| ts.with_timezone(&Local).format("%d.%m.%Y %H:%M").to_string())
            .unwrap_or_default()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.scheduled_for
            .is_some_and(|at| (now - at).num_milliseconds().abs() < DUE_WINDOW_SECS * 1000)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    #[default]
    Upcoming,
    All,
}

impl NotificationMode {
    pub fn toggled(self) -> Self {
        match self {
            NotificationMode::Upcoming => NotificationMode::All,
            NotificationMode::All => NotificationMode::Upcoming,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnoozePayload {
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSettings {
    pub reminders_enabled: bool,
    pub period_alerts_enabled: bool,
}

pub fn unread_count(items: &[Notification]) -> usize {
    items.iter().filter(|n| !n.is_read).count()
}
