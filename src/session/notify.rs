/// How loud a notification should present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { severity: Severity::Info, title: title.into(), description: description.into() }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { severity: Severity::Error, title: title.into(), description: description.into() }
    }
}

/// Fire-and-forget surface for user-visible notices. The session never reads
/// a result back; how a notice is rendered is entirely the implementor's
/// concern.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
