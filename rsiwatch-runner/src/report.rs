//! Breach notifications.
//!
//! A pass with at least one breaching instrument produces one
//! [`Notification`]: a fixed subject and one line per breaching instrument.
//! Delivery is behind [`Notifier`]; the built-in notifiers log the message or
//! drop one message file per recipient into an outbox directory for an
//! external mail relay.

use crate::config::ReportConfig;
use crate::evaluate::{InstrumentEvaluation, PassReport};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One notification line for a breaching instrument.
pub fn format_line(evaluation: &InstrumentEvaluation) -> Option<String> {
    let window = evaluation.window.filter(|w| w.is_breach())?;
    let since = window.since.unwrap_or(window.date);
    Some(format!(
        "RSI: {:.2}. Exceeded since: {}\t{} ({}) exceeded threshold.\n",
        window.value, since, evaluation.instrument.name, evaluation.instrument.symbol
    ))
}

/// `None` when nothing breaches.
pub fn compose(pass: &PassReport, report: &ReportConfig) -> Option<Notification> {
    let body: String = pass.evaluations().filter_map(format_line).collect();
    if body.is_empty() {
        return None;
    }
    Some(Notification {
        subject: report.subject.clone(),
        body,
        recipients: report.recipients.clone(),
    })
}

pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes the notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            subject = %notification.subject,
            recipients = ?notification.recipients,
            "\n{}",
            notification.body
        );
        Ok(())
    }
}

/// Drops one RFC 5322-style message file per recipient into a directory.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn message(notification: &Notification, recipient: &str, date: &str) -> String {
        format!(
            "To: {recipient}\r\nSubject: {}\r\nDate: {date}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            notification.subject, notification.body
        )
    }

    /// First `<stem>.eml`, `<stem>-1.eml`, ... not already in the outbox.
    fn free_path(&self, stem: &str) -> PathBuf {
        let mut path = self.dir.join(format!("{stem}.eml"));
        let mut n = 1u32;
        while path.exists() {
            path = self.dir.join(format!("{stem}-{n}.eml"));
            n += 1;
        }
        path
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.recipients.is_empty() {
            tracing::warn!(subject = %notification.subject, "no recipients configured");
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).map_err(|source| NotifyError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let now = chrono::Utc::now();
        let stamp = now.format("%Y%m%dT%H%M%S%6f");
        let date = now.to_rfc2822();

        // Recipients are delivered one at a time; a failure stops the rest.
        for (i, recipient) in notification.recipients.iter().enumerate() {
            let path = self.free_path(&format!("{stamp}-{i:03}-{}", mailbox_slug(recipient)));
            let tmp = path.with_extension("eml.tmp");
            std::fs::write(&tmp, Self::message(notification, recipient, &date))
                .and_then(|()| std::fs::rename(&tmp, &path))
                .map_err(|source| NotifyError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing::info!(recipient, path = %path.display(), "notification queued");
        }
        Ok(())
    }
}

fn mailbox_slug(recipient: &str) -> String {
    recipient
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
