use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopseed_generate::Sleeper;
use tracing::{debug, info, warn};

use crate::errors::{MediaError, Result};
use crate::jobs::{ImageJobBackend, JobStatus};
use crate::subject::{ImageSubject, ImageTarget};
use crate::workflow::attach_callback;

/// How finished jobs are detected in a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    #[default]
    Polling,
    Callback,
}

/// Result of submitting a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobHandle {
    /// The job finished and its base64 image is available now.
    Finished { job_id: String, image: String },
    /// The image will arrive later through the callback endpoint.
    Pending { job_id: String },
}

/// Body the job service posts to the callback endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCallback {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Delivers the outcome of an image job, either by polling or by callback.
#[async_trait]
pub trait JobCompletionNotifier: Send + Sync {
    fn mode(&self) -> CompletionMode;

    /// Start a job for `target` from an already rendered workflow.
    async fn submit(&self, target: ImageTarget, workflow: Value) -> Result<JobHandle>;

    /// Match a callback to the job it belongs to.
    ///
    /// Returns the target and image only for a known job reported as
    /// `success`. The job stays pending until [`complete`](Self::complete)
    /// is called, so a redelivered callback can still be applied. Failure
    /// statuses forget the job; any other status leaves it waiting.
    fn resolve(&self, callback: &JobCallback) -> Option<(ImageTarget, String)> {
        warn!(
            event = "image_callback_ignored",
            job_id = %callback.id,
            mode = ?self.mode(),
            "callbacks are not expected in this mode"
        );
        None
    }

    /// Forget a job once its image is stored.
    fn complete(&self, _job_id: &str) {}
}

/// Statuses after which a job will never report an image.
const FAILURE_STATUSES: [&str; 4] = ["failed", "error", "cancelled", "timed_out"];

fn is_failure(status: &str) -> bool {
    FAILURE_STATUSES
        .iter()
        .any(|failure| status.eq_ignore_ascii_case(failure))
}

/// Starts a job and polls its status until it finishes.
pub struct PollingNotifier {
    jobs: Arc<dyn ImageJobBackend>,
    sleeper: Arc<dyn Sleeper>,
    max_polls: u32,
    interval: Duration,
}

impl PollingNotifier {
    pub fn new(
        jobs: Arc<dyn ImageJobBackend>,
        sleeper: Arc<dyn Sleeper>,
        max_polls: u32,
        interval: Duration,
    ) -> Self {
        Self {
            jobs,
            sleeper,
            max_polls,
            interval,
        }
    }

    async fn wait_for(&self, job_id: &str) -> Result<String> {
        for poll in 1..=self.max_polls {
            match self.jobs.status(job_id).await? {
                JobStatus::Completed { image: Some(image) } => return Ok(image),
                JobStatus::Completed { image: None } => {
                    return Err(MediaError::MissingImage {
                        job_id: job_id.to_string(),
                    });
                }
                JobStatus::Failed { detail } => {
                    return Err(MediaError::JobFailed {
                        job_id: job_id.to_string(),
                        detail,
                    });
                }
                JobStatus::InProgress(state) => {
                    debug!(event = "image_job_waiting", job_id, poll, state = %state);
                    if poll < self.max_polls {
                        self.sleeper.sleep(self.interval).await;
                    }
                }
            }
        }
        Err(MediaError::PollTimeout {
            job_id: job_id.to_string(),
            attempts: self.max_polls,
        })
    }
}

#[async_trait]
impl JobCompletionNotifier for PollingNotifier {
    fn mode(&self) -> CompletionMode {
        CompletionMode::Polling
    }

    async fn submit(&self, target: ImageTarget, workflow: Value) -> Result<JobHandle> {
        let job_id = self.jobs.start(&workflow).await?;
        info!(event = "image_job_submitted", target = %target, job_id = %job_id);
        let image = self.wait_for(&job_id).await?;
        Ok(JobHandle::Finished { job_id, image })
    }
}

/// Starts a job that reports back to the server's callback endpoint.
///
/// Pending jobs live in memory only; a restart forgets them.
pub struct CallbackNotifier {
    jobs: Arc<dyn ImageJobBackend>,
    public_base_url: String,
    pending: Mutex<HashMap<String, ImageTarget>>,
}

impl CallbackNotifier {
    pub fn new(jobs: Arc<dyn ImageJobBackend>, public_base_url: impl Into<String>) -> Self {
        Self {
            jobs,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn callback_url(&self, subject: ImageSubject) -> String {
        format!(
            "{}/api/{}/images/callback",
            self.public_base_url,
            subject.route()
        )
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }
}

#[async_trait]
impl JobCompletionNotifier for CallbackNotifier {
    fn mode(&self) -> CompletionMode {
        CompletionMode::Callback
    }

    async fn submit(&self, target: ImageTarget, mut workflow: Value) -> Result<JobHandle> {
        attach_callback(&mut workflow, &self.callback_url(target.subject), target.id);
        let job_id = self.jobs.start(&workflow).await?;
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(job_id.clone(), target);
        }
        info!(event = "image_job_submitted", target = %target, job_id = %job_id);
        Ok(JobHandle::Pending { job_id })
    }

    fn resolve(&self, callback: &JobCallback) -> Option<(ImageTarget, String)> {
        let mut pending = self.pending.lock().ok()?;
        let Some(target) = pending.get(&callback.id).copied() else {
            warn!(event = "image_callback_ignored", job_id = %callback.id, reason = "unknown job");
            return None;
        };
        if is_failure(&callback.status) {
            pending.remove(&callback.id);
            warn!(
                event = "image_job_failed",
                job_id = %callback.id,
                target = %target,
                status = %callback.status
            );
            return None;
        }
        if !callback.status.eq_ignore_ascii_case("success") {
            debug!(
                event = "image_callback_ignored",
                job_id = %callback.id,
                target = %target,
                status = %callback.status,
                reason = "job not finished"
            );
            return None;
        }
        match &callback.image {
            Some(image) if !image.is_empty() => Some((target, image.clone())),
            _ => {
                warn!(
                    event = "image_callback_ignored",
                    job_id = %callback.id,
                    target = %target,
                    reason = "no image payload"
                );
                None
            }
        }
    }

    fn complete(&self, job_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(job_id);
        }
    }
}
