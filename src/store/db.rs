//! SQLite-backed mail store.
//!
//! One connection per run, opened by `main` and passed to the ingestion
//! pipeline. Ingestion is idempotent: saving a mail whose id is already
//! present is a no-op, so re-running over an overlapping listing never
//! duplicates rows or attachment files.
//!
//! Concurrent external invocations are not serialized here; callers that
//! schedule overlapping runs must serialize them themselves.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::decode::DecodedAttachment;
use crate::error::{Result, SweepError};
use crate::model::attachment::storage_file_name;
use crate::model::mail::MailRecord;

/// Schema DDL run on open.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mail (
    id TEXT PRIMARY KEY,
    from_email TEXT NOT NULL,
    to_email TEXT NOT NULL,
    cc TEXT,
    subject TEXT NOT NULL,
    plain_body TEXT,
    html_body TEXT,
    received_on INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS attachment (
    id TEXT PRIMARY KEY,
    mail_id TEXT NOT NULL REFERENCES mail(id),
    name TEXT NOT NULL,
    path TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mail_received_on ON mail(received_on DESC);
";

/// Handle on the local mail database and attachment directory.
pub struct MailStore {
    conn: Connection,
    attachments_dir: PathBuf,
}

impl MailStore {
    /// Open (creating if needed) the database and attachment directory.
    pub fn open(db_path: &Path, attachments_dir: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, e))?;
        }
        std::fs::create_dir_all(attachments_dir)
            .map_err(|e| SweepError::io(attachments_dir, e))?;

        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %db_path.display(), "Opened mail store");

        Ok(Self {
            conn,
            attachments_dir: attachments_dir.to_path_buf(),
        })
    }

    /// Epoch seconds of the most recently received persisted mail, if any.
    pub fn last_received_at(&self) -> Result<Option<i64>> {
        let latest = self
            .conn
            .query_row("SELECT MAX(received_on) FROM mail", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?;
        Ok(latest.flatten())
    }

    /// Whether a mail with this provider id is already persisted.
    pub fn contains(&self, mail_id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM mail WHERE id = ?1", params![mail_id], |_| {
                Ok(())
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Persist a mail and its attachments; skip entirely if the id exists.
    ///
    /// Returns `true` when a new record was written. Attachment bytes are
    /// written under the attachment directory first, then the rows are
    /// inserted in one transaction.
    pub fn save_mail(
        &mut self,
        record: &MailRecord,
        attachments: &[DecodedAttachment],
    ) -> Result<bool> {
        if self.contains(&record.id)? {
            debug!(mail_id = %record.id, "mail already stored, skipping");
            return Ok(false);
        }

        let mut stored = Vec::with_capacity(attachments.len());
        for att in attachments {
            let path = self
                .attachments_dir
                .join(storage_file_name(&att.id, &att.filename));
            std::fs::write(&path, &att.data).map_err(|e| SweepError::io(&path, e))?;
            stored.push((att, path));
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO mail (id, from_email, to_email, cc, subject, plain_body, html_body, received_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.from,
                record.to,
                record.cc,
                record.subject,
                record.plain_body,
                record.html_body,
                record.received_at.timestamp(),
            ],
        )?;
        for (att, path) in &stored {
            tx.execute(
                "INSERT INTO attachment (id, mail_id, name, path) VALUES (?1, ?2, ?3, ?4)",
                params![att.id, record.id, att.filename, path.to_string_lossy().into_owned()],
            )?;
        }
        tx.commit()?;

        debug!(
            mail_id = %record.id,
            attachments = attachments.len(),
            "mail persisted"
        );
        Ok(true)
    }

    /// Number of persisted mails (used by summaries and tests).
    pub fn mail_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM mail", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_record(id: &str, received_epoch: i64) -> MailRecord {
        MailRecord {
            id: id.to_string(),
            from: "alice@example.com".to_string(),
            to: "bob@example.com".to_string(),
            cc: None,
            subject: "hello".to_string(),
            plain_body: Some("body".to_string()),
            html_body: None,
            received_at: Utc.timestamp_opt(received_epoch, 0).unwrap(),
        }
    }

    fn open_store(dir: &Path) -> MailStore {
        MailStore::open(&dir.join("mail.db"), &dir.join("attachments")).expect("open")
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        drop(open_store(dir.path()));
        // Re-running the schema DDL must be safe.
        drop(open_store(dir.path()));
    }

    #[test]
    fn test_last_received_at_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(dir.path());
        assert_eq!(store.last_received_at().unwrap(), None);
    }

    #[test]
    fn test_save_and_query_cutoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(dir.path());

        assert!(store.save_mail(&sample_record("m1", 1_000), &[]).unwrap());
        assert!(store.save_mail(&sample_record("m2", 2_000), &[]).unwrap());
        assert_eq!(store.last_received_at().unwrap(), Some(2_000));
        assert!(store.contains("m1").unwrap());
        assert!(!store.contains("m3").unwrap());
    }

    #[test]
    fn test_duplicate_save_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(dir.path());

        let attachment = DecodedAttachment {
            id: "att-1".to_string(),
            filename: "a.txt".to_string(),
            data: b"bytes".to_vec(),
        };
        assert!(store
            .save_mail(&sample_record("m1", 1_000), std::slice::from_ref(&attachment))
            .unwrap());
        // Second save with the same id: no new row, no new file.
        assert!(!store
            .save_mail(&sample_record("m1", 1_000), std::slice::from_ref(&attachment))
            .unwrap());

        assert_eq!(store.mail_count().unwrap(), 1);
        let files: Vec<_> = std::fs::read_dir(dir.path().join("attachments"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_attachment_written_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(dir.path());

        let attachment = DecodedAttachment {
            id: "att-9".to_string(),
            filename: "report.pdf".to_string(),
            data: b"%PDF-".to_vec(),
        };
        store
            .save_mail(&sample_record("m1", 1_000), &[attachment])
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("attachments"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_report.pdf"));
        assert_eq!(std::fs::read(&entries[0]).unwrap(), b"%PDF-");
    }
}
