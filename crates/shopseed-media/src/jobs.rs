use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::{MediaError, Result};

/// State of an image job as reported by the job service.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Finished; carries the base64 payload when one was returned.
    Completed { image: Option<String> },
    Failed { detail: String },
    /// Queued or running, with the service's own status label.
    InProgress(String),
}

/// External image-generation job service.
#[async_trait]
pub trait ImageJobBackend: Send + Sync {
    /// Submit a workflow and return the job id.
    async fn start(&self, workflow: &Value) -> Result<String>;

    async fn status(&self, job_id: &str) -> Result<JobStatus>;
}

/// Job service reached over HTTP (`POST <base>/run`, `GET <base>/status/<id>`).
pub struct HttpJobBackend {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl HttpJobBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MediaError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn interpret(response: StatusResponse) -> JobStatus {
    match response.status.as_str() {
        "COMPLETED" => JobStatus::Completed {
            image: response
                .output
                .as_ref()
                .and_then(|output| output.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        "FAILED" => JobStatus::Failed {
            detail: response
                .error
                .or(response.output)
                .map(|detail| detail.to_string())
                .unwrap_or_else(|| "no detail".to_string()),
        },
        other => JobStatus::InProgress(other.to_string()),
    }
}

#[async_trait]
impl ImageJobBackend for HttpJobBackend {
    async fn start(&self, workflow: &Value) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/run", self.base_url))
            .bearer_auth(&self.token)
            .json(workflow)
            .send()
            .await?;
        let started: StartResponse = Self::checked(response).await?.json().await?;
        debug!(event = "image_job_started", job_id = %started.id);
        Ok(started.id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus> {
        let response = self
            .client
            .get(format!("{}/status/{job_id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status: StatusResponse = Self::checked(response).await?.json().await?;
        Ok(interpret(status))
    }
}
