//! Payload decoder: multipart tree → flat mail content.
//!
//! Walks a message's payload tree depth-first and folds it into one
//! [`DecodedMail`]: at most one plain-text body, at most one HTML body, and
//! the attachments in traversal order. The accumulator is threaded through
//! the fold and returned, never shared by reference.
//!
//! A failure inside one part (missing data, undecodable base64, failed
//! attachment fetch) is logged and skipped at that part's granularity;
//! siblings and parents are unaffected.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use tracing::{debug, warn};

use crate::client::MailApi;
use crate::error::{Result, SweepError};
use crate::model::payload::MessagePart;

/// URL-safe base64, padding accepted or absent. Providers strip the
/// trailing `=` padding from payload data.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Flat result of decoding one payload tree.
#[derive(Debug, Clone, Default)]
pub struct DecodedMail {
    pub plain_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<DecodedAttachment>,
}

/// One decoded attachment, bytes in memory until the store writes them out.
#[derive(Debug, Clone)]
pub struct DecodedAttachment {
    /// Provider-assigned attachment id.
    pub id: String,
    /// Display filename from the payload part.
    pub filename: String,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

/// What a single leaf contributed.
enum LeafContent {
    PlainBody(String),
    HtmlBody(String),
    Attachment(DecodedAttachment),
    /// Media type outside the fixed body mapping.
    Ignored,
}

/// Decode a whole payload tree.
///
/// `api` is only consulted for attachments too large to be inlined;
/// each such leaf triggers exactly one out-of-band fetch. Decoding is
/// idempotent: the same tree always yields the same result.
pub fn decode_payload(message_id: &str, root: &MessagePart, api: &dyn MailApi) -> DecodedMail {
    fold_part(DecodedMail::default(), message_id, root, api)
}

/// Fold one node (and, for containers, its subtree) into the accumulator.
fn fold_part(
    mut acc: DecodedMail,
    message_id: &str,
    part: &MessagePart,
    api: &dyn MailApi,
) -> DecodedMail {
    if part.is_multipart() {
        return part
            .parts
            .iter()
            .fold(acc, |acc, child| fold_part(acc, message_id, child, api));
    }

    match decode_leaf(message_id, part, api) {
        Ok(LeafContent::PlainBody(text)) => {
            if acc.plain_body.is_none() {
                acc.plain_body = Some(text);
            } else {
                debug!(message_id, "extra text/plain part ignored");
            }
        }
        Ok(LeafContent::HtmlBody(text)) => {
            if acc.html_body.is_none() {
                acc.html_body = Some(text);
            } else {
                debug!(message_id, "extra text/html part ignored");
            }
        }
        Ok(LeafContent::Attachment(att)) => acc.attachments.push(att),
        Ok(LeafContent::Ignored) => {
            debug!(
                message_id,
                mime_type = %part.mime_type,
                "no body slot for media type, part skipped"
            );
        }
        Err(e) => {
            warn!(
                message_id,
                mime_type = %part.mime_type,
                error = %e,
                "failed to decode payload part, skipping"
            );
        }
    }
    acc
}

/// Decode a single leaf node.
fn decode_leaf(message_id: &str, part: &MessagePart, api: &dyn MailApi) -> Result<LeafContent> {
    let body = part
        .body
        .as_ref()
        .ok_or_else(|| SweepError::Decode(format!("{} part has no body", part.mime_type)))?;

    // A named leaf is an attachment regardless of media type.
    if !part.filename.is_empty() {
        let id = body.attachment_id.clone().ok_or_else(|| {
            SweepError::Decode(format!("attachment '{}' has no attachment id", part.filename))
        })?;
        let data = match body.data.as_deref() {
            Some(inline) => decode_base64url(inline)?,
            // Above the inlining threshold: fetch lazily by id.
            None => api.get_attachment(message_id, &id)?,
        };
        return Ok(LeafContent::Attachment(DecodedAttachment {
            id,
            filename: part.filename.clone(),
            data,
        }));
    }

    // Unnamed leaves fill a body slot, if the media type maps to one.
    let slot: fn(String) -> LeafContent = match part.mime_type.as_str() {
        "text/plain" => LeafContent::PlainBody,
        "text/html" => LeafContent::HtmlBody,
        _ => return Ok(LeafContent::Ignored),
    };
    let raw = body
        .data
        .as_deref()
        .ok_or_else(|| SweepError::Decode(format!("{} part has no inline data", part.mime_type)))?;
    let bytes = decode_base64url(raw)?;
    Ok(slot(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Decode URL-safe base64 with or without padding.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(data)
        .map_err(|e| SweepError::Decode(format!("base64: {e}")))
}
