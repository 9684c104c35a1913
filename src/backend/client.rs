//! HTTP client for the dashboard backend.
//!
//! Wraps every endpoint the client consumes: liveness, bot status and
//! actions, the jobs fallback fetch, mark-as-read, and the SSE stream
//! handshake. Every call is time-bounded; a timed-out request future is
//! dropped, abandoning the in-flight request so a late response can
//! never be observed.

use super::stream::JobStream;
use crate::config::defaults::{BOT_ACTION_TIMEOUT_SECS, HTTP_CONNECT_TIMEOUT_SECS};
use crate::types::{BotAction, BotState, JobRecord, ServerEpoch};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

// ============================================================================
// Errors
// ============================================================================

/// Backend API errors, classified per the client's failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server returned status {0}")]
    Server(reqwest::StatusCode),
    #[error("authentication rejected (status {0})")]
    Auth(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Protocol(String),
}

/// Coarse failure classes driving component behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network/timeout/5xx: recoverable, drives backoff, never a UI alert
    Connectivity,
    /// 401-class: terminal for the cycle, not retried
    Auth,
    /// Undecodable payload: dropped, never crashes a component
    Protocol,
}

impl ApiError {
    /// Classify this error for retry/backoff decisions. Anything that is
    /// not an auth rejection or a broken payload is treated as a
    /// connectivity problem and retried.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Auth(_) => ErrorClass::Auth,
            Self::Protocol(_) => ErrorClass::Protocol,
            Self::Http(_) | Self::Timeout(_) | Self::Server(_) => ErrorClass::Connectivity,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.class() == ErrorClass::Auth
    }
}

// ============================================================================
// Response Shapes
// ============================================================================

/// `GET /health` response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
    pub server_start_time: ServerEpoch,
    #[serde(default)]
    pub uptime: u64,
}

/// `POST /api/bot/{action}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<JobRecord>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    valid: bool,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the dashboard backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL for logging.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`: liveness check, no auth. Returns the server epoch
    /// used for restart detection.
    pub async fn health(&self, timeout: Duration) -> Result<HealthResponse, ApiError> {
        let url = format!("{}/health", self.base_url);
        self.get_json(&url, None, timeout).await
    }

    /// `GET /api/auth/verify`: check whether a stored token is still
    /// accepted. An auth rejection is the answer, not an error.
    pub async fn verify_token(&self, token: &str, timeout: Duration) -> Result<bool, ApiError> {
        let url = format!("{}/api/auth/verify", self.base_url);
        match self
            .get_json::<VerifyResponse>(&url, Some(token), timeout)
            .await
        {
            Ok(resp) => Ok(resp.valid),
            Err(e) if e.is_auth() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `GET /api/bot/status`: authoritative bot state.
    pub async fn bot_status(&self, token: &str, timeout: Duration) -> Result<BotState, ApiError> {
        let url = format!("{}/api/bot/status", self.base_url);
        self.get_json(&url, Some(token), timeout).await
    }

    /// `POST /api/bot/{start|stop|pause|resume}`.
    pub async fn bot_action(
        &self,
        token: &str,
        action: BotAction,
    ) -> Result<ActionResponse, ApiError> {
        let url = format!("{}/api/bot/{}", self.base_url, action.path_segment());
        let timeout = Duration::from_secs(BOT_ACTION_TIMEOUT_SECS);

        let request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {token}"));

        let response = bounded(timeout, request.send()).await??;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Auth(status));
        }
        // Action failures come back as 200 + {success: false} or as an
        // error status; decode whichever body is present.
        let body = bounded(timeout, response.bytes()).await??;
        serde_json::from_slice(&body).map_err(|e| {
            if status.is_success() {
                ApiError::Protocol(e.to_string())
            } else {
                ApiError::Server(status)
            }
        })
    }

    /// `GET /api/jobs`: polling fallback, equivalent to a snapshot event.
    pub async fn jobs(&self, token: &str, timeout: Duration) -> Result<Vec<JobRecord>, ApiError> {
        let url = format!("{}/api/jobs", self.base_url);
        let resp: JobsResponse = self.get_json(&url, Some(token), timeout).await?;
        Ok(resp.jobs)
    }

    /// `POST /api/jobs/{id}/mark-read`: persist a read flag server-side.
    pub async fn mark_job_read(&self, token: &str, job_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/jobs/{}/mark-read", self.base_url, job_id);
        let timeout = Duration::from_secs(BOT_ACTION_TIMEOUT_SECS);

        let request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {token}"));

        let response = bounded(timeout, request.send()).await??;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Auth(status));
        }
        if !status.is_success() {
            return Err(ApiError::Server(status));
        }
        Ok(())
    }

    /// Open the SSE job stream. The stream endpoint authenticates via a
    /// query token because `EventSource` cannot send headers; the same
    /// convention is kept here.
    pub async fn open_job_stream(
        &self,
        token: &str,
        connect_timeout: Duration,
    ) -> Result<JobStream, ApiError> {
        let url = format!("{}/api/jobs/stream", self.base_url);
        let request = self.http.get(&url).query(&[("token", token)]);

        let response = bounded(connect_timeout, request.send()).await??;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Auth(status));
        }
        if !status.is_success() {
            return Err(ApiError::Server(status));
        }

        Ok(JobStream::from_response(response))
    }

    /// Shared GET-and-decode path. Status is checked before the body is
    /// decoded so auth failures classify correctly even when the error
    /// body is not JSON.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let mut request = self.http.get(url);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = bounded(timeout, request.send()).await??;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Auth(status));
        }
        if !status.is_success() {
            return Err(ApiError::Server(status));
        }

        let body = bounded(timeout, response.bytes()).await??;
        serde_json::from_slice(&body).map_err(|e| ApiError::Protocol(e.to_string()))
    }
}

/// Bound a future with a timeout, mapping elapse to [`ApiError::Timeout`].
async fn bounded<F, T>(timeout: Duration, fut: F) -> Result<T, ApiError>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ApiError::Timeout(timeout))
}
