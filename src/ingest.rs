//! Ingestion pipeline: list → fetch → decode → persist.
//!
//! One run lists every message in a folder newer than the most recently
//! persisted one, then processes the batch sequentially. The cutoff is
//! computed once at pipeline start, so a message arriving mid-run is either
//! in or out of this run by a single consistent boundary.
//!
//! A listing failure aborts the run; a failure on one message is logged,
//! counted and skipped, and the batch continues. Skipped messages are
//! picked up by the next run (at-least-once per run).

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::client::MailApi;
use crate::decode::decode_payload;
use crate::error::Result;
use crate::model::mail::MailRecord;
use crate::store::MailStore;

/// Counters reported after a fetch run.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestSummary {
    /// Ids returned by the listing.
    pub listed: usize,
    /// Newly persisted mails.
    pub saved: usize,
    /// Already present, left untouched.
    pub skipped: usize,
    /// Fetch/decode/persist failures (logged, not fatal).
    pub failed: usize,
    /// Whether the run stopped early on the time limit.
    pub stopped_early: bool,
}

/// Outcome of processing one listed id.
enum Outcome {
    Saved,
    Skipped,
}

/// Fetch new messages from `folder` into the store.
pub fn run_fetch(
    api: &dyn MailApi,
    store: &mut MailStore,
    folder: &str,
    max_run: Duration,
) -> Result<IngestSummary> {
    let cutoff = store.last_received_at()?;
    let mut query = format!("in:{folder}");
    if let Some(epoch) = cutoff {
        query.push_str(&format!(" after:{epoch}"));
    }
    info!(folder, %query, "listing new messages");

    let ids = api.list_message_ids(&query)?;
    let mut summary = IngestSummary {
        listed: ids.len(),
        ..IngestSummary::default()
    };

    let started = Instant::now();
    for id in &ids {
        if started.elapsed() > max_run {
            let remaining = summary.listed - summary.saved - summary.skipped - summary.failed;
            warn!(
                remaining,
                "run duration limit reached, deferring the rest to the next run"
            );
            summary.stopped_early = true;
            break;
        }

        match ingest_one(api, store, id) {
            Ok(Outcome::Saved) => summary.saved += 1,
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                warn!(mail_id = %id, error = %e, "failed to ingest message, continuing");
                summary.failed += 1;
            }
        }
    }

    info!(
        listed = summary.listed,
        saved = summary.saved,
        skipped = summary.skipped,
        failed = summary.failed,
        "fetch run complete"
    );
    Ok(summary)
}

/// Fetch, decode and persist a single message.
fn ingest_one(api: &dyn MailApi, store: &mut MailStore, id: &str) -> Result<Outcome> {
    if store.contains(id)? {
        return Ok(Outcome::Skipped);
    }

    let message = api.get_message(id)?;
    let received_at = message.received_at()?;
    let decoded = decode_payload(&message.id, &message.payload, api);

    let record = MailRecord {
        id: message.id.clone(),
        from: message.header("From"),
        to: message.header("To"),
        cc: non_empty(message.header("Cc")),
        subject: message.header("Subject"),
        plain_body: decoded.plain_body,
        html_body: decoded.html_body,
        received_at,
    };

    if store.save_mail(&record, &decoded.attachments)? {
        Ok(Outcome::Saved)
    } else {
        Ok(Outcome::Skipped)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
