//! User-facing notifications
//!
//! Every remote failure caught at a service boundary ends up as exactly one
//! notification here. Views decide how to show them (toast, banner, inline);
//! the default implementation only logs.

use std::sync::Mutex;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A single notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }
}

/// Sink for transient user notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that writes to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(notice = %notice.message, "user notice"),
            NoticeLevel::Error => tracing::warn!(notice = %notice.message, "user notice"),
        }
    }
}

/// Notifier that keeps every notice, for tests and headless callers
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

/// Report an error to the user once: log it, then notify
pub(crate) fn report(notifier: &dyn Notifier, context: &str, err: &crate::SdkError) {
    tracing::warn!(context, error = %err, "operation failed");
    notifier.notify(Notice::error(err.user_message()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SdkError;

    #[test]
    fn test_report_notifies_once() {
        let notifier = RecordingNotifier::new();
        report(&notifier, "invoice", &SdkError::NotFound("invoice 7".into()));
        notifier.notify(Notice::success("Invoice saved"));

        let notices = notifier.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notifier.errors().len(), 1);
        assert_eq!(notices[1], Notice::success("Invoice saved"));
    }
}
