//! Narrow interface to the external calendar / video-conferencing service.
//!
//! Calls are best-effort: callers turn a [`CalendarError`] into a
//! [`ServiceWarning`](super::error::ServiceWarning) and carry on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BookingId, TopicId, UserId};

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar integration is disabled")]
    Disabled,

    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("calendar configuration error: {0}")]
    Configuration(String),
}

/// What the calendar needs to schedule one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub booking_id: BookingId,
    pub teacher_id: UserId,
    pub student_id: UserId,
    pub topic_id: TopicId,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub event_id: String,
    #[serde(default)]
    pub join_link: Option<String>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn create_event(&self, details: &EventDetails) -> Result<CalendarEvent, CalendarError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError>;

    /// `false` means callers should skip the calls entirely.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Used when no calendar is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCalendar;

#[async_trait]
impl CalendarService for DisabledCalendar {
    async fn create_event(&self, _details: &EventDetails) -> Result<CalendarEvent, CalendarError> {
        Err(CalendarError::Disabled)
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), CalendarError> {
        Err(CalendarError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// JSON webhook: `POST {base}/events` and `DELETE {base}/events/{id}`.
#[derive(Debug, Clone)]
pub struct WebhookCalendar {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl WebhookCalendar {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CalendarError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CalendarError::Configuration(
                "calendar.base_url must be set for the webhook calendar".to_string(),
            ));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
    if !resp.status().is_success() {
        return Err(CalendarError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

#[async_trait]
impl CalendarService for WebhookCalendar {
    async fn create_event(&self, details: &EventDetails) -> Result<CalendarEvent, CalendarError> {
        let request = self
            .client
            .post(format!("{}/events", self.base_url))
            .json(details);
        let resp = check_response(self.authorize(request).send().await?).await?;
        Ok(resp.json::<CalendarEvent>().await?)
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let request = self
            .client
            .delete(format!("{}/events/{}", self.base_url, event_id));
        let resp = self.authorize(request).send().await?;
        // already gone
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_response(resp).await.map(|_| ())
    }
}

/// `[calendar]` section of `lms.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// `"disabled"` or `"webhook"`.
    pub mode: String,
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_ms: u64,
    /// Length of the event created for each lesson.
    pub lesson_minutes: u32,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            mode: "disabled".to_string(),
            base_url: String::new(),
            api_token: None,
            timeout_ms: 5_000,
            lesson_minutes: 60,
        }
    }
}

impl CalendarSettings {
    pub fn build(&self) -> Result<Arc<dyn CalendarService>, CalendarError> {
        match self.mode.to_lowercase().as_str() {
            "disabled" | "" => Ok(Arc::new(DisabledCalendar)),
            "webhook" => Ok(Arc::new(WebhookCalendar::new(
                self.base_url.clone(),
                self.api_token.clone(),
                Duration::from_millis(self.timeout_ms),
            )?)),
            other => Err(CalendarError::Configuration(format!(
                "unknown calendar mode: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_build_disabled_calendar() {
        let calendar = CalendarSettings::default().build().unwrap();
        assert!(!calendar.is_enabled());
    }

    #[test]
    fn test_webhook_requires_base_url() {
        let settings = CalendarSettings {
            mode: "webhook".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.build(),
            Err(CalendarError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let settings = CalendarSettings {
            mode: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(settings.build().is_err());
    }

    #[test]
    fn test_event_response_parses_without_join_link() {
        let event: CalendarEvent = serde_json::from_str(r#"{"eventId":"evt-1"}"#).unwrap();
        assert_eq!(event.event_id, "evt-1");
        assert!(event.join_link.is_none());
    }

    #[tokio::test]
    async fn test_disabled_calendar_refuses_calls() {
        assert!(matches!(
            DisabledCalendar.delete_event("evt-1").await,
            Err(CalendarError::Disabled)
        ));
    }
}
