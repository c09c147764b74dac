//! Provider client: the `MailApi` seam and its HTTP implementation.
//!
//! Both pipelines depend on the [`MailApi`] trait; tests substitute mocks.
//! [`HttpMailClient`] is the production implementation: a blocking HTTP
//! client with a bearer token, constructed once per run and passed by
//! reference to every component that needs it.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth;
use crate::config::{self, Config};
use crate::decode::decode_base64url;
use crate::error::{Result, SweepError};
use crate::model::payload::{
    AttachmentData, BatchModifyRequest, Label, ListLabelsResponse, ListMessagesResponse, Message,
};

/// Operations the remote mailbox exposes.
pub trait MailApi {
    /// Search for messages; returns provider ids only.
    fn list_message_ids(&self, query: &str) -> Result<Vec<String>>;

    /// Fetch a full message including its payload tree.
    fn get_message(&self, id: &str) -> Result<Message>;

    /// Fetch the decoded bytes of a non-inlined attachment.
    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;

    /// List all labels ("folders") with their opaque ids.
    fn list_labels(&self) -> Result<Vec<Label>>;

    /// Apply label additions/removals to many messages in one call.
    fn batch_modify(
        &self,
        ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;
}

/// Blocking HTTP implementation of [`MailApi`].
pub struct HttpMailClient {
    http: Client,
    base_url: String,
    token: String,
    max_retries: u32,
    backoff: Duration,
}

impl HttpMailClient {
    /// Build a client from configuration, acquiring a valid bearer token
    /// (refreshing the persisted state if expired).
    pub fn connect(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.network.request_timeout_secs))
            .build()
            .map_err(|e| SweepError::provider("client init", e))?;

        let token = auth::access_token(&config::token_path(cfg), &http)?;

        Ok(Self {
            http,
            base_url: cfg.provider.api_base_url.trim_end_matches('/').to_string(),
            token,
            max_retries: cfg.network.max_retries,
            backoff: Duration::from_millis(cfg.network.retry_backoff_ms),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    /// Send a request with bounded retries.
    ///
    /// Transport errors, 429 and 5xx responses are retried with exponential
    /// backoff; anything else non-success maps to a `Provider` error.
    fn send_with_retry(
        &self,
        endpoint: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = build().bearer_auth(&self.token).send();
            let retry_after = match outcome {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if retryable(response.status()) && attempt < self.max_retries => {
                    format!("status {}", response.status())
                }
                Ok(response) => {
                    return Err(SweepError::provider(
                        endpoint,
                        format!("status {}", response.status()),
                    ))
                }
                Err(e) if attempt < self.max_retries => format!("transport error: {e}"),
                Err(e) => return Err(SweepError::provider(endpoint, e)),
            };

            let delay = self.backoff * 2u32.saturating_pow(attempt);
            warn!(
                endpoint,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying after {retry_after}"
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(endpoint);
        let response =
            self.send_with_retry(endpoint, || self.http.get(&url).query(query))?;
        response
            .json()
            .map_err(|e| SweepError::provider(endpoint, format!("bad response body: {e}")))
    }
}

fn retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl MailApi for HttpMailClient {
    fn list_message_ids(&self, query: &str) -> Result<Vec<String>> {
        debug!(query, "listing messages");
        let response: ListMessagesResponse =
            self.get_json("users/me/messages", &[("q", query)])?;
        Ok(response.messages.into_iter().map(|m| m.id).collect())
    }

    fn get_message(&self, id: &str) -> Result<Message> {
        self.get_json(&format!("users/me/messages/{id}"), &[])
    }

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let endpoint = format!("users/me/messages/{message_id}/attachments/{attachment_id}");
        let payload: AttachmentData = self.get_json(&endpoint, &[])?;
        let data = payload.data.ok_or_else(|| {
            SweepError::provider(&endpoint, "attachment response carries no data")
        })?;
        decode_base64url(&data)
    }

    fn list_labels(&self) -> Result<Vec<Label>> {
        let response: ListLabelsResponse = self.get_json("users/me/labels", &[])?;
        Ok(response.labels)
    }

    fn batch_modify(
        &self,
        ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let endpoint = "users/me/messages/batchModify";
        let request = BatchModifyRequest {
            ids: ids.to_vec(),
            add_label_ids: add_label_ids.to_vec(),
            remove_label_ids: remove_label_ids.to_vec(),
        };
        let url = self.url(endpoint);
        self.send_with_retry(endpoint, || self.http.post(&url).json(&request))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!retryable(StatusCode::NOT_FOUND));
        assert!(!retryable(StatusCode::UNAUTHORIZED));
        assert!(!retryable(StatusCode::BAD_REQUEST));
    }
}
