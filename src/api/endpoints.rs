use async_trait::async_trait;
use reqwest::Method;

use super::{client::Ack, ApiClient, ApiError};
use crate::{
    models::{
        cycle::{Cycle, CyclePayload},
        dashboard::Dashboard,
        feedback::FeedbackPayload,
        insights::{InsightsSummary, Predictions},
        notification::{Notification, NotificationMode, NotificationSettings, SnoozePayload},
        reminder::{MedicationReminder, ReminderPayload},
        symptom::{Symptom, SymptomPayload},
        user::{
            ForgotPasswordPayload, LoginPayload, LoginResponse, RegisterPayload,
            ResetPasswordPayload, UserProfile,
        },
    },
    services::notifications::NotificationSource,
};

const NO_BODY: Option<&()> = None;

// Auth

impl ApiClient {
    pub async fn register(&self, payload: &RegisterPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/register/", Some(payload)).await
    }

    pub async fn login(&self, payload: &LoginPayload) -> Result<LoginResponse, ApiError> {
        self.send_json(Method::POST, "/login/", payload).await
    }

    pub async fn validate_login(&self, payload: &LoginPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/login/validate", Some(payload))
            .await
    }

    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/users/profile").await
    }

    pub async fn forgot_password(&self, payload: &ForgotPasswordPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/forgot-password/", Some(payload))
            .await
    }

    pub async fn reset_password(&self, payload: &ResetPasswordPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/reset-password/", Some(payload))
            .await
    }
}

// Dashboard, insights, feedback

impl ApiClient {
    pub async fn dashboard(&self) -> Result<Dashboard, ApiError> {
        self.get_json("/dashboard").await
    }

    pub async fn insights_summary(&self) -> Result<InsightsSummary, ApiError> {
        self.get_json("/insights/summary").await
    }

    pub async fn insights_predictions(&self) -> Result<Predictions, ApiError> {
        self.get_json("/insights/predictions").await
    }

    pub async fn submit_feedback(&self, payload: &FeedbackPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/feedback/", Some(payload))
            .await
    }
}

// Cycles

impl ApiClient {
    pub async fn cycles(&self) -> Result<Vec<Cycle>, ApiError> {
        self.get_json("/cycles").await
    }

    pub async fn cycle(&self, id: i64) -> Result<Cycle, ApiError> {
        self.get_json(&format!("/cycles/{id}")).await
    }

    pub async fn create_cycle(&self, payload: &CyclePayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/cycles", Some(payload)).await
    }

    pub async fn update_cycle(&self, id: i64, payload: &CyclePayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::PUT, &format!("/cycles/{id}"), Some(payload))
            .await
    }

    pub async fn delete_cycle(&self, id: i64) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::DELETE, &format!("/cycles/{id}"), NO_BODY)
            .await
    }
}

// Symptoms

impl ApiClient {
    pub async fn symptoms(&self) -> Result<Vec<Symptom>, ApiError> {
        self.get_json("/symptoms").await
    }

    pub async fn symptom(&self, id: i64) -> Result<Symptom, ApiError> {
        self.get_json(&format!("/symptoms/{id}")).await
    }

    pub async fn create_symptom(&self, payload: &SymptomPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/symptoms", Some(payload)).await
    }

    pub async fn update_symptom(&self, id: i64, payload: &SymptomPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::PUT, &format!("/symptoms/{id}"), Some(payload))
            .await
    }

    pub async fn delete_symptom(&self, id: i64) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::DELETE, &format!("/symptoms/{id}"), NO_BODY)
            .await
    }
}

// Medication reminders

impl ApiClient {
    pub async fn reminders(&self) -> Result<Vec<MedicationReminder>, ApiError> {
        self.get_json("/reminders/medications").await
    }

    pub async fn reminder(&self, id: i64) -> Result<MedicationReminder, ApiError> {
        self.get_json(&format!("/reminders/medications/{id}")).await
    }

    pub async fn create_reminder(&self, payload: &ReminderPayload) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, "/reminders/medications", Some(payload))
            .await
    }

    pub async fn update_reminder(
        &self,
        id: i64,
        payload: &ReminderPayload,
    ) -> Result<Ack, ApiError> {
        self.send_for_ack(
            Method::PUT,
            &format!("/reminders/medications/{id}"),
            Some(payload),
        )
        .await
    }

    pub async fn delete_reminder(&self, id: i64) -> Result<Ack, ApiError> {
        self.send_for_ack(
            Method::DELETE,
            &format!("/reminders/medications/{id}"),
            NO_BODY,
        )
        .await
    }
}

// Notifications

impl ApiClient {
    pub async fn upcoming_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get_json("/notifications/upcoming").await
    }

    pub async fn all_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get_json("/notifications/all").await
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::POST, &format!("/notifications/{id}/read"), NO_BODY)
            .await
    }

    pub async fn snooze_notification(&self, id: i64, minutes: u32) -> Result<Ack, ApiError> {
        self.send_for_ack(
            Method::POST,
            &format!("/notifications/{id}/snooze"),
            Some(&SnoozePayload { minutes }),
        )
        .await
    }

    pub async fn update_notification_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<Ack, ApiError> {
        self.send_for_ack(Method::PUT, "/notifications/settings", Some(settings))
            .await
    }
}

#[async_trait]
impl NotificationSource for ApiClient {
    async fn fetch(&self, mode: NotificationMode) -> Result<Vec<Notification>, ApiError> {
        match mode {
            NotificationMode::Upcoming => self.upcoming_notifications().await,
            NotificationMode::All => self.all_notifications().await,
        }
    }

    async fn mark_read(&self, id: i64) -> Result<(), ApiError> {
        self.mark_notification_read(id).await.map(|_| ())
    }

    async fn snooze(&self, id: i64, minutes: u32) -> Result<(), ApiError> {
        self.snooze_notification(id, minutes).await.map(|_| ())
    }
}
