//! Notification payloads and delivery sinks.
//!
//! The core hands one [`Notification`] per change event to a
//! [`NotificationSink`]. Sinks never build shell command lines from record
//! data; they pass the payload as structured data only.

mod mail;
mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, NotifyConfig, SinkKind};

pub use mail::MailSink;
pub use webhook::WebhookSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    New,
    Changed,
}

/// Payload delivered for one change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub id: String,
    pub name: String,
    pub grade: String,
    pub credits: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_grade: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_event(event: &ChangeEvent) -> Self {
        let record = event.current();
        let kind = match event {
            ChangeEvent::New(_) => NotificationKind::New,
            ChangeEvent::Changed { .. } => NotificationKind::Changed,
        };

        Self {
            kind,
            id: record.id.clone(),
            name: record.name.clone(),
            grade: record.grade.clone(),
            credits: record.credits.clone(),
            previous_grade: event.previous().map(|r| r.grade.clone()),
            detected_at: Utc::now(),
        }
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        match (&self.kind, &self.previous_grade) {
            (NotificationKind::Changed, Some(previous)) => format!(
                "{} {}: grade {} -> {} ({} credits)",
                self.id, self.name, previous, self.grade, self.credits
            ),
            _ => format!(
                "{} {}: grade {} ({} credits)",
                self.id, self.name, self.grade, self.credits
            ),
        }
    }
}

/// Delivers notifications to the user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        log::info!("Grade notification: {}", notification.summary());
        Ok(())
    }
}

/// Build the sink selected in the configuration.
pub fn build_sink(config: &NotifyConfig) -> Result<Arc<dyn NotificationSink>> {
    let sink: Arc<dyn NotificationSink> = match config.sink {
        SinkKind::Log => Arc::new(LogSink),
        SinkKind::Mail => {
            let address = config
                .mail_address
                .clone()
                .ok_or_else(|| AppError::config("notify.mail_address is not set"))?;
            Arc::new(MailSink::new(&config.mail_command, address, &config.mail_subject))
        }
        SinkKind::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .ok_or_else(|| AppError::config("notify.webhook_url is not set"))?;
            Arc::new(WebhookSink::new(url)?)
        }
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    #[test]
    fn test_changed_payload_carries_previous_grade() {
        let event = ChangeEvent::Changed {
            old: Record::new("A", "Algo", "4,0", "5"),
            new: Record::new("A", "Algo", "1,3", "5"),
        };
        let notification = Notification::from_event(&event);

        assert_eq!(notification.kind, NotificationKind::Changed);
        assert_eq!(notification.grade, "1,3");
        assert_eq!(notification.previous_grade.as_deref(), Some("4,0"));
        assert_eq!(notification.summary(), "A Algo: grade 4,0 -> 1,3 (5 credits)");
    }

    #[test]
    fn test_new_payload_json() {
        let event = ChangeEvent::New(Record::new("B", "Boole", "2,0", "6"));
        let json = serde_json::to_value(Notification::from_event(&event)).unwrap();

        assert_eq!(json["kind"], "new");
        assert_eq!(json["id"], "B");
        assert_eq!(json["credits"], "6");
        assert!(json.get("previous_grade").is_none());
    }

    #[tokio::test]
    async fn test_log_sink_delivers() {
        let event = ChangeEvent::New(Record::new("B", "Boole", "2,0", "6"));
        assert!(LogSink.deliver(&Notification::from_event(&event)).await.is_ok());
    }

    #[test]
    fn test_build_sink_by_kind() {
        let mut config = NotifyConfig::default();
        assert_eq!(build_sink(&config).unwrap().name(), "log");

        config.sink = SinkKind::Mail;
        assert!(build_sink(&config).is_err());
        config.mail_address = Some("student@example.org".to_string());
        assert_eq!(build_sink(&config).unwrap().name(), "mail");

        config.sink = SinkKind::Webhook;
        config.webhook_url = Some("https://hooks.example/grades".to_string());
        assert_eq!(build_sink(&config).unwrap().name(), "webhook");
    }
}
