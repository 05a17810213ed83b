//! Feedback submission over HTTP.
//!
//! Sends `POST <endpoint>` with `Authorization: Bearer <credential>` and a
//! JSON body `{"content": "..."}`. A 2xx response with a JSON body counts as
//! success; everything else maps onto a small set of user-facing errors.

use crate::config::FeedbackConfig;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use tokenbridge_core::{FeedbackRequest, Snapshot};

/// Why a submission did not go through.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("no usable credential from the host application")]
    NotAuthenticated,
    #[error("feedback content is empty")]
    EmptyContent,
    #[error("feedback is {len} characters, the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("credential rejected (HTTP 401)")]
    InvalidCredential,
    #[error("not permitted (HTTP 403)")]
    Forbidden,
    #[error("submission failed: {0}")]
    Failed(String),
}

impl SubmitError {
    /// Short, actionable text for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmitError::NotAuthenticated => "Please wait for authentication from the host app.",
            SubmitError::EmptyContent => "Please enter your feedback.",
            SubmitError::TooLong { .. } => "Your feedback is too long. Please shorten it.",
            SubmitError::Network(_) => {
                "Cannot reach the server. Please check your network connection."
            }
            SubmitError::InvalidCredential => "Your session is not valid. Please sign in again.",
            SubmitError::Forbidden => "You do not have permission to do this.",
            SubmitError::Failed(_) => "Something went wrong while sending. Please try again.",
        }
    }

    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => SubmitError::InvalidCredential,
            StatusCode::FORBIDDEN => SubmitError::Forbidden,
            other => SubmitError::Failed(format!("HTTP {other}")),
        }
    }
}

/// Client for the feedback endpoint.
#[derive(Debug, Clone)]
pub struct FeedbackClient {
    http: reqwest::Client,
    config: FeedbackConfig,
}

impl FeedbackClient {
    pub fn new(config: FeedbackConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: FeedbackConfig) -> Self {
        Self { http, config }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Trim and bound-check `content`.
    pub fn prepare(&self, content: &str) -> Result<FeedbackRequest, SubmitError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SubmitError::EmptyContent);
        }
        let len = content.chars().count();
        if len > self.config.max_length {
            return Err(SubmitError::TooLong {
                len,
                max: self.config.max_length,
            });
        }
        Ok(FeedbackRequest {
            content: content.to_string(),
        })
    }

    /// Submit `content` using the credential in `snapshot`.
    pub async fn submit(
        &self,
        snapshot: &Snapshot,
        content: &str,
    ) -> Result<serde_json::Value, SubmitError> {
        let credential = snapshot
            .usable_credential()
            .ok_or(SubmitError::NotAuthenticated)?;
        let body = self.prepare(content)?;

        let response = self
            .http
            .post(&self.config.endpoint)
            .header(AUTHORIZATION, credential.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("feedback request failed: {}", e);
                if e.is_builder() {
                    SubmitError::Failed(e.to_string())
                } else {
                    SubmitError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "feedback endpoint refused submission");
            return Err(SubmitError::from_status(status));
        }

        let receipt = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SubmitError::Failed(format!("response is not JSON: {e}")))?;
        tracing::info!("feedback submitted");
        Ok(receipt)
    }
}
