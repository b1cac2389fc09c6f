use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Form,
    Field,
}

impl LinkKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            LinkKind::Form => "forms",
            LinkKind::Field => "fields",
        }
    }
}

/// What a notifier needs to deliver a link to someone.
#[derive(Debug, Clone, Serialize)]
pub struct LinkNotice {
    pub kind: LinkKind,
    pub admin_id: Uuid,
    pub associate_id: Option<Uuid>,
    pub recipient: Option<String>,
    pub subject: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No recipient for link")]
    MissingRecipient,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Delivery seam for issued links.
#[async_trait]
pub trait LinkNotifier: Send + Sync {
    async fn notify(&self, notice: &LinkNotice) -> Result<(), NotifyError>;
}

/// Writes the link to the log instead of sending it anywhere.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl LinkNotifier for LogNotifier {
    async fn notify(&self, notice: &LinkNotice) -> Result<(), NotifyError> {
        let recipient = notice.recipient.as_deref().ok_or(NotifyError::MissingRecipient)?;
        tracing::info!(
            kind = ?notice.kind,
            admin_id = %notice.admin_id,
            recipient,
            expires_at = %notice.expires_at,
            "{}: {}",
            notice.subject,
            notice.url
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every notice it is handed.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub notices: Mutex<Vec<LinkNotice>>,
    }

    #[async_trait]
    impl LinkNotifier for RecordingNotifier {
        async fn notify(&self, notice: &LinkNotice) -> Result<(), NotifyError> {
            self.notices.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }

    fn notice(recipient: Option<&str>) -> LinkNotice {
        LinkNotice {
            kind: LinkKind::Field,
            admin_id: Uuid::nil(),
            associate_id: Some(Uuid::nil()),
            recipient: recipient.map(str::to_string),
            subject: "Atualize seu cadastro".to_string(),
            url: "http://localhost:5173/fields/abc".to_string(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn log_notifier_needs_a_recipient() {
        let notifier = LogNotifier;
        assert!(notifier.notify(&notice(Some("ana@example.com"))).await.is_ok());
        assert!(matches!(notifier.notify(&notice(None)).await, Err(NotifyError::MissingRecipient)));
    }

    #[tokio::test]
    async fn notifiers_work_as_trait_objects() {
        let recording = std::sync::Arc::new(RecordingNotifier::default());
        let notifier: std::sync::Arc<dyn LinkNotifier> = recording.clone();
        notifier.notify(&notice(None)).await.unwrap();
        assert_eq!(recording.notices.lock().unwrap().len(), 1);
    }
}
