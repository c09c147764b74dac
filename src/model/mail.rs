//! Persisted mail record.

use chrono::{DateTime, Utc};

/// A single ingested message as stored in the local database.
///
/// Written once by [`crate::store::MailStore::save_mail`] and never mutated;
/// re-ingesting the same provider id is a no-op.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MailRecord {
    /// Provider-assigned message id (primary key).
    pub id: String,

    /// Sender (`From` header, verbatim).
    pub from: String,

    /// Primary recipients (`To` header, verbatim).
    pub to: String,

    /// Carbon-copy recipients (`Cc` header), if present.
    pub cc: Option<String>,

    /// Decoded subject line.
    pub subject: String,

    /// Plain-text body (from the `text/plain` part, if any).
    pub plain_body: Option<String>,

    /// HTML body (from the `text/html` part, if any).
    pub html_body: Option<String>,

    /// When the provider received the message (UTC).
    pub received_at: DateTime<Utc>,
}
