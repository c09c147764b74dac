//! `mailsweep` — a personal mail-management utility.
//!
//! Two independent pipelines share one provider-client abstraction:
//! ingestion pulls messages from a remote mailbox API into a local SQLite
//! store (decoding multipart payloads into bodies and attachment files),
//! and filtering compiles a declarative rule list into a single search
//! query and applies batched label actions to the matches.

pub mod actions;
pub mod auth;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod ingest;
pub mod model;
pub mod query;
pub mod rules;
pub mod store;
