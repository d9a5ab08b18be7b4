//! The backend client used by the console and the CLI commands.

use std::path::Path;
use std::time::Duration;

use ci_protocol::{
    backend_error_text, AnalysisFamily, AnalysisVariant, ApiEndpoints, BackendCredentials,
    ColumnMapping, ColumnsResponse, JobHandle, JobStatusReport, LogType, ProtocolError,
    ResourceMetric, ResultPayload, ValidatedMapping, DEFAULT_API_BASE,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ZETA,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::poller::{JobPoller, PollConfig};
use crate::{ClientError, JobError};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            poll: PollConfig::default(),
        }
    }
}

/// Result of a successful upload: what the mapping page needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file_name: String,
    pub log_type: LogType,
    pub columns: ColumnsResponse,
}

impl UploadOutcome {
    /// Fresh mapping form for this log.
    pub fn mapping(&self) -> ColumnMapping {
        ColumnMapping::from_response(&self.columns, self.log_type)
    }
}

/// Typed access to every backend operation.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    endpoints: ApiEndpoints,
    poller: JobPoller,
}

impl BackendClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            poller: JobPoller::new(http.clone(), config.poll),
            endpoints: ApiEndpoints::new(config.base_url),
            http,
        })
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    pub async fn save_credentials(&self, credentials: &BackendCredentials) -> Result<(), ClientError> {
        let url = self.endpoints.credentials();
        let response = self.http.post(&url).json(credentials).send().await?;
        expect_success(response, &url).await?;
        tracing::info!(pool = %credentials.data_pool_name, "Credentials saved");
        Ok(())
    }

    /// Upload a `.csv` or `.xes` log, then fetch the columns it exposes.
    ///
    /// The extension is checked before anything is sent.
    pub async fn upload_log(
        &self,
        path: &Path,
        data_table_name: Option<&str>,
    ) -> Result<UploadOutcome, ClientError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProtocolError::UnsupportedLogFile(path.display().to_string()))?
            .to_string();
        let local_type = LogType::from_file_name(&file_name)?;

        let content = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let size = content.len();

        let mut form = Form::new().part("file", Part::bytes(content).file_name(file_name.clone()));
        if let Some(table) = data_table_name.map(str::trim).filter(|t| !t.is_empty()) {
            form = form.text("metadata", json!({ "dataTableName": table }).to_string());
        }

        let url = self.endpoints.upload_log();
        let response = self.http.post(&url).multipart(form).send().await?;
        expect_success(response, &url).await?;
        tracing::info!(file = %file_name, bytes = size, "Log uploaded");

        let columns = self.fetch_columns().await?;
        let log_type = LogType::classify(columns.log_type.as_deref(), &file_name)?;
        if log_type != local_type {
            tracing::debug!(file = %file_name, %log_type, "Backend reclassified the log");
        }
        Ok(UploadOutcome {
            file_name,
            log_type,
            columns,
        })
    }

    pub async fn fetch_columns(&self) -> Result<ColumnsResponse, ClientError> {
        let url = self.endpoints.column_names();
        let response = self.http.get(&url).send().await?;
        let response = expect_success(response, &url).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Submit a validated mapping. The free-form response seeds the results view.
    pub async fn commit_mapping(&self, mapping: &ValidatedMapping) -> Result<Value, ClientError> {
        let url = self.endpoints.commit_mapping();
        let response = self.http.post(&url).json(mapping).send().await?;
        let response = expect_success(response, &url).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Start the family's compute job. Temporal profiles take a zeta > 0.
    pub async fn start_job(
        &self,
        family: AnalysisFamily,
        zeta: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<JobHandle, JobError> {
        let url = self
            .endpoints
            .start(family)
            .ok_or(JobError::Synchronous(family))?;
        let mut query = Vec::new();
        if family == AnalysisFamily::TemporalProfile {
            let zeta = zeta.unwrap_or(DEFAULT_ZETA);
            if !(zeta > 0.0 && zeta.is_finite()) {
                return Err(ProtocolError::InvalidZeta(zeta).into());
            }
            query.push(("zeta", zeta.to_string()));
        }
        let id = self.poller.start(&url, &query, cancel).await?;
        Ok(JobHandle::new(id, family))
    }

    /// Fetch a variant's result. Job-backed variants poll with `job`,
    /// which must belong to the variant's family.
    pub async fn fetch_result(
        &self,
        variant: AnalysisVariant,
        job: Option<&JobHandle>,
        cancel: &CancellationToken,
    ) -> Result<ResultPayload, JobError> {
        let value = if variant.requires_job() {
            let job = job.ok_or(JobError::NoJob(variant.family()))?;
            if job.family() != variant.family() {
                return Err(JobError::FamilyMismatch {
                    handle: job.family(),
                    requested: variant.family(),
                });
            }
            let url = self.endpoints.result(variant, Some(job.id()));
            self.poller.poll(&url, cancel).await?
        } else {
            let url = self.endpoints.result(variant, None);
            self.poller.fetch_once(&url, cancel).await?
        };
        Ok(ResultPayload::from_value(value))
    }

    /// Start (if needed) and fetch in one go.
    pub async fn run(
        &self,
        variant: AnalysisVariant,
        zeta: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<ResultPayload, JobError> {
        if !variant.requires_job() {
            return self.fetch_result(variant, None, cancel).await;
        }
        let job = self.start_job(variant.family(), zeta, cancel).await?;
        self.fetch_result(variant, Some(&job), cancel).await
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ClientError> {
        let url = self.endpoints.job_status(job_id);
        let response = self.http.get(&url).send().await?;
        let response = expect_success(response, &url).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Query a scalar resource-profile metric. The backend answers with a
    /// bare number.
    pub async fn scalar_metric(
        &self,
        metric: ResourceMetric,
        params: &[(String, String)],
    ) -> Result<f64, ClientError> {
        let url = self.endpoints.metric(metric);
        let response = self.http.get(&url).query(params).send().await?;
        let response = expect_success(response, &url).await?;
        let text = response.text().await?;
        let trimmed = text.trim().trim_matches('"');
        trimmed
            .parse::<f64>()
            .map_err(|_| ClientError::Decode(format!("expected a number, got '{trimmed}'")))
    }
}

async fn expect_success(response: Response, url: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = backend_error_text(&body);
    tracing::warn!(endpoint = url, status = status.as_u16(), error = %message, "Backend request failed");
    Err(ClientError::Backend {
        status: status.as_u16(),
        message,
    })
}
