use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::Serialize;
use shopseed_store::Store;
use tracing::{info, warn};

use crate::errors::Result;
use crate::notifier::{CompletionMode, JobCallback, JobCompletionNotifier, JobHandle};
use crate::storage::ObjectStore;
use crate::subject::{ImageSubject, ImageTarget};
use crate::workflow::WorkflowTemplate;

/// Records whose image URL can be updated.
#[async_trait]
pub trait ImageRecords: Send + Sync {
    async fn set_image_url(&self, target: ImageTarget, url: &str) -> Result<()>;
}

#[async_trait]
impl ImageRecords for Store {
    async fn set_image_url(&self, target: ImageTarget, url: &str) -> Result<()> {
        match target.subject {
            ImageSubject::User => self.set_user_image(target.id, url).await?,
            ImageSubject::Product => self.set_product_image(target.id, url).await?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ImageOutcome {
    Stored { url: String },
    Pending {
        #[serde(rename = "jobId")]
        job_id: String,
    },
}

/// Workflow templates per subject.
#[derive(Debug, Clone)]
pub struct Templates {
    pub user: WorkflowTemplate,
    pub product: WorkflowTemplate,
}

impl Templates {
    fn for_subject(&self, subject: ImageSubject) -> &WorkflowTemplate {
        match subject {
            ImageSubject::User => &self.user,
            ImageSubject::Product => &self.product,
        }
    }
}

/// Generates an image for one record, uploads it, and saves its URL.
pub struct ImageService {
    notifier: Arc<dyn JobCompletionNotifier>,
    storage: Arc<dyn ObjectStore>,
    records: Arc<dyn ImageRecords>,
    templates: Templates,
}

impl ImageService {
    pub fn new(
        notifier: Arc<dyn JobCompletionNotifier>,
        storage: Arc<dyn ObjectStore>,
        records: Arc<dyn ImageRecords>,
        templates: Templates,
    ) -> Self {
        Self {
            notifier,
            storage,
            records,
            templates,
        }
    }

    pub fn mode(&self) -> CompletionMode {
        self.notifier.mode()
    }

    pub async fn generate(&self, target: ImageTarget, prompt: &str) -> Result<ImageOutcome> {
        let workflow = self.templates.for_subject(target.subject).render(prompt);
        match self.notifier.submit(target, workflow).await? {
            JobHandle::Finished { job_id, image } => {
                let url = self.store_image(target, &image).await?;
                info!(event = "image_stored", target = %target, job_id = %job_id, url = %url);
                Ok(ImageOutcome::Stored { url })
            }
            JobHandle::Pending { job_id } => Ok(ImageOutcome::Pending { job_id }),
        }
    }

    /// Apply a job callback. Returns the stored URL when the callback
    /// carried an image for a job this server is waiting on.
    ///
    /// The job is forgotten only after its image is stored; a failed upload
    /// or record update leaves it pending for a redelivered callback.
    pub async fn handle_callback(
        &self,
        subject: ImageSubject,
        callback: &JobCallback,
    ) -> Result<Option<String>> {
        let Some((target, image)) = self.notifier.resolve(callback) else {
            return Ok(None);
        };
        if target.subject != subject {
            warn!(
                event = "image_callback_ignored",
                job_id = %callback.id,
                endpoint = %subject,
                target = %target,
                reason = "subject mismatch"
            );
            return Ok(None);
        }
        let url = self.store_image(target, &image).await?;
        self.notifier.complete(&callback.id);
        info!(event = "image_stored", target = %target, job_id = %callback.id, url = %url);
        Ok(Some(url))
    }

    async fn store_image(&self, target: ImageTarget, encoded: &str) -> Result<String> {
        let bytes = STANDARD.decode(encoded.trim())?;
        let key = target
            .subject
            .object_key(target.id, Utc::now().timestamp_millis());
        let url = self.storage.put_png(&key, bytes).await?;
        self.records.set_image_url(target, &url).await?;
        Ok(url)
    }
}
