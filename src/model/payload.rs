//! Provider wire types.
//!
//! These structs mirror the JSON shapes returned by the mailbox REST API:
//! a message envelope carrying a recursive multipart payload tree, label
//! descriptors, and the list/attachment response wrappers. Field names are
//! `camelCase` on the wire.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};

/// A full message as returned by `GET /users/me/messages/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,

    /// Epoch milliseconds, serialized as a string by the provider.
    #[serde(default)]
    pub internal_date: Option<String>,

    /// Root of the multipart payload tree.
    pub payload: MessagePart,
}

impl Message {
    /// Parse `internalDate` into a UTC timestamp.
    pub fn received_at(&self) -> Result<DateTime<Utc>> {
        let raw = self
            .internal_date
            .as_deref()
            .ok_or_else(|| SweepError::Decode(format!("message {} has no internalDate", self.id)))?;
        let millis: i64 = raw
            .parse()
            .map_err(|_| SweepError::Decode(format!("bad internalDate '{raw}'")))?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| SweepError::Decode(format!("internalDate '{raw}' out of range")))
    }

    /// Look up a header value on the payload root, case-insensitively.
    ///
    /// Returns an empty string when the header is absent, matching how the
    /// provider omits unused headers.
    pub fn header(&self, name: &str) -> String {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }
}

/// One node of the multipart payload tree.
///
/// A node whose `mime_type` starts with `multipart` is an interior node and
/// carries its children in `parts`; all other nodes are leaves.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub mime_type: String,

    /// Attachment filename; empty for body parts.
    #[serde(default)]
    pub filename: String,

    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(default)]
    pub body: Option<PartBody>,

    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// Whether this node is an interior multipart container.
    pub fn is_multipart(&self) -> bool {
        self.mime_type.starts_with("multipart")
    }
}

/// Body descriptor of a leaf part.
///
/// Small parts carry their bytes inline in `data` (base64, URL-safe
/// alphabet); parts above the provider's inlining threshold carry only an
/// `attachment_id` for out-of-band retrieval.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub data: Option<String>,
}

/// A single message header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A provider label ("folder"): opaque id plus visible name.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Response wrapper for `GET /users/me/messages?q=...`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

/// An id-only message reference from a list response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// Response wrapper for `GET /users/me/labels`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLabelsResponse {
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Response for an out-of-band attachment fetch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentData {
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub data: Option<String>,
}

/// Request body for `POST /users/me/messages/batchModify`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchModifyRequest {
    pub ids: Vec<String>,
    pub add_label_ids: Vec<String>,
    pub remove_label_ids: Vec<String>,
}
