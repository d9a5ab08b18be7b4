//! Start-then-poll job protocol shared by every results tab.

use std::time::Duration;

use ci_protocol::{
    backend_error_text, JobStartResponse, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS,
};
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::JobError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between two poll requests.
    pub interval: Duration,
    /// Poll requests made before giving up.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Starts server-side jobs and waits for their results.
///
/// Every network call races the cancellation token, and the token is checked
/// again before a result is returned, so a cancelled caller never receives
/// data.
#[derive(Debug, Clone)]
pub struct JobPoller {
    http: Client,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(http: Client, config: PollConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// POST the compute endpoint and return the job id it hands out.
    pub async fn start(
        &self,
        url: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<String, JobError> {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let request = self.http.post(url).query(query);
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            r = request.send() => r,
        };
        let response = sent.map_err(|e| JobError::StartFailure {
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(endpoint = url, status = status.as_u16(), "Job start rejected");
            return Err(JobError::StartFailure {
                status: Some(status.as_u16()),
                message: backend_error_text(&body),
            });
        }

        let started: JobStartResponse = response
            .json()
            .await
            .map_err(|e| JobError::Decode(e.to_string()))?;
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        tracing::info!(job_id = %started.job_id, endpoint = url, "Job started");
        Ok(started.job_id)
    }

    /// GET `url` until it answers 2xx, at most `max_attempts` times.
    ///
    /// Non-2xx answers and transport errors both count as "not ready yet".
    /// The first 2xx body is decoded and returned without further requests.
    pub async fn poll(&self, url: &str, cancel: &CancellationToken) -> Result<Value, JobError> {
        let attempts = self.config.max_attempts;
        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                r = self.http.get(url).send() => r,
            };
            match sent {
                Ok(response) if response.status().is_success() => {
                    let body = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(JobError::Cancelled),
                        body = response.bytes() => body,
                    };
                    let value = decode_body(body)?;
                    if cancel.is_cancelled() {
                        return Err(JobError::Cancelled);
                    }
                    tracing::debug!(attempt, endpoint = url, "Result ready");
                    return Ok(value);
                }
                Ok(response) => {
                    tracing::debug!(
                        attempt,
                        endpoint = url,
                        status = response.status().as_u16(),
                        "Result not ready"
                    );
                }
                Err(e) => {
                    tracing::debug!(attempt, endpoint = url, error = %e, "Poll request failed");
                }
            }
            if attempt < attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(JobError::Cancelled),
                    _ = tokio::time::sleep(self.config.interval) => {}
                }
            }
        }
        tracing::warn!(attempts, endpoint = url, "Gave up waiting for result");
        Err(JobError::Timeout { attempts })
    }

    /// Single GET against a stateless endpoint.
    pub async fn fetch_once(&self, url: &str, cancel: &CancellationToken) -> Result<Value, JobError> {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            r = self.http.get(url).send() => r,
        };
        let response = sent.map_err(|e| JobError::StartFailure {
            status: None,
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobError::StartFailure {
                status: Some(status.as_u16()),
                message: backend_error_text(&body),
            });
        }
        let value = decode_body(response.bytes().await)?;
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(value)
    }
}

fn decode_body<B: AsRef<[u8]>>(body: Result<B, reqwest::Error>) -> Result<Value, JobError> {
    let body = body.map_err(|e| JobError::Decode(e.to_string()))?;
    let bytes = body.as_ref();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| JobError::Decode(e.to_string()))
}
