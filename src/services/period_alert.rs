use chrono::NaiveDate;
use tracing::info;

use crate::{error::AppError, services::storage::StorageService};

pub const PERIOD_TODAY_MESSAGE: &str = "Your period is predicted to start today. Take care!";

pub fn marker_key(day: NaiveDate) -> String {
    format!("predictedPeriodNotified_{}", day.format("%Y-%m-%d"))
}

/// Raises the "period starts today" alert at most once per calendar day.
/// Markers are never cleaned up.
#[derive(Clone)]
pub struct PeriodAlert {
    storage: StorageService,
}

impl PeriodAlert {
    pub fn new(storage: StorageService) -> Self {
        Self { storage }
    }

    pub async fn check(
        &self,
        next_period: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Option<&'static str>, AppError> {
        if next_period != Some(today) {
            return Ok(None);
        }
        let key = marker_key(today);
        if self.storage.get_item(&key).await?.is_some() {
            return Ok(None);
        }
        self.storage.set_item(&key, "true").await?;
        info!(%today, "period start alert raised");
        Ok(Some(PERIOD_TODAY_MESSAGE))
    }
}
