//! Persisted attachment record and on-disk naming.

use sha2::{Digest, Sha256};

/// Length of the hex digest prefix used in attachment file names.
const NAME_DIGEST_LEN: usize = 16;

/// Maximum length kept from the original filename.
const NAME_MAX_LEN: usize = 150;

/// An attachment row, linked many-to-one to its parent mail.
///
/// Attachments are created alongside their mail and share its lifetime;
/// they are never deleted independently.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AttachmentRecord {
    /// Provider-assigned attachment id.
    pub id: String,

    /// Owning mail id.
    pub mail_id: String,

    /// Display filename as it appeared in the payload part.
    pub name: String,

    /// Where the decoded bytes were written, relative paths resolved
    /// against the configured attachments directory at save time.
    pub path: String,
}

/// Derive the on-disk file name for an attachment.
///
/// The name is `<sha256(id) hex prefix>_<sanitized filename>`. Hashing the
/// full provider id keeps the name deterministic while avoiding collisions
/// between distinct attachments that share a filename; provider ids are far
/// too long to embed verbatim.
pub fn storage_file_name(attachment_id: &str, filename: &str) -> String {
    let digest = Sha256::digest(attachment_id.as_bytes());
    let mut prefix = String::with_capacity(NAME_DIGEST_LEN);
    for byte in digest.iter().take(NAME_DIGEST_LEN / 2) {
        prefix.push_str(&format!("{byte:02x}"));
    }
    format!("{prefix}_{}", sanitize_filename_part(filename, NAME_MAX_LEN))
}

/// Replace path separators and control characters, and bound the length.
///
/// An empty or all-invalid filename becomes `"attachment"`.
pub fn sanitize_filename_part(name: &str, max_len: usize) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(max_len)
        .collect();

    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed.to_string()
    }
}
