//! Filtering pipeline and action applier.
//!
//! Compiles the rule list into one search query, lists the matching
//! message ids, and applies the requested actions as a single batched
//! label mutation. Folder names are resolved to provider label ids before
//! anything is mutated; a name that does not resolve aborts the run with
//! no partial mutation submitted.
//!
//! The batch call is all-or-nothing from our perspective: the remote API
//! reports success or failure for the whole id list, never per id.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::client::MailApi;
use crate::error::{Result, SweepError};
use crate::model::payload::Label;
use crate::query::compile_query;
use crate::rules::{Predicate, Rule};

/// Label id the provider uses for the unread marker.
const UNREAD_LABEL_ID: &str = "UNREAD";

/// What the filter command was asked to do.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Folder whose messages are matched against the rules.
    pub folder: String,
    /// Whether all rules must match or any single one suffices.
    pub predicate: Predicate,
    /// Destination folder for a move, if requested.
    pub move_to: Option<String>,
    /// Remove the unread marker from matches.
    pub mark_read: bool,
}

/// Result of a filter run.
#[derive(Debug, Clone)]
pub struct FilterSummary {
    /// The compiled search query, for display.
    pub query: String,
    /// How many messages matched.
    pub matched: usize,
    /// Whether a mutation was submitted.
    pub modified: bool,
}

/// Run the filtering pipeline.
///
/// `now` is the reference instant for duration rules; callers pass
/// `Utc::now()` outside of tests.
pub fn run_filter(
    api: &dyn MailApi,
    opts: &FilterOptions,
    rules: &[Rule],
    now: DateTime<Utc>,
) -> Result<FilterSummary> {
    // Compilation failures abort before any network call.
    let query = compile_query(&opts.folder, rules, opts.predicate, now)?;
    info!(%query, "compiled filter query");

    let ids = api.list_message_ids(&query)?;
    if ids.is_empty() {
        info!("no messages matched the filter");
        return Ok(FilterSummary {
            query,
            matched: 0,
            modified: false,
        });
    }

    let mut add_label_ids = Vec::new();
    let mut remove_label_ids = Vec::new();
    if opts.mark_read {
        remove_label_ids.push(UNREAD_LABEL_ID.to_string());
    }
    if let Some(ref destination) = opts.move_to {
        // Resolve both ends before mutating anything.
        let labels = api.list_labels()?;
        add_label_ids.push(resolve_label_id(&labels, destination)?);
        remove_label_ids.push(resolve_label_id(&labels, &opts.folder)?);
    }

    if add_label_ids.is_empty() && remove_label_ids.is_empty() {
        info!(matched = ids.len(), "no actions requested, nothing to apply");
        return Ok(FilterSummary {
            query,
            matched: ids.len(),
            modified: false,
        });
    }

    api.batch_modify(&ids, &add_label_ids, &remove_label_ids)?;
    info!(
        matched = ids.len(),
        added = add_label_ids.len(),
        removed = remove_label_ids.len(),
        "actions applied"
    );
    Ok(FilterSummary {
        query,
        matched: ids.len(),
        modified: true,
    })
}

/// Resolve a visible folder name to the provider's opaque label id.
///
/// Matching is case-insensitive: system folders are upper-cased on the
/// provider side ("INBOX") while users type them lower-case.
fn resolve_label_id(labels: &[Label], name: &str) -> Result<String> {
    labels
        .iter()
        .find(|label| label.name.eq_ignore_ascii_case(name))
        .map(|label| label.id.clone())
        .ok_or_else(|| SweepError::FolderNotFound(name.to_string()))
}
