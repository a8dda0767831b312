use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shopseed_generate::{OpenAiBackend, Sleeper, TextBackend, TokioSleeper};
use shopseed_media::{
    CallbackNotifier, CompletionMode, HttpJobBackend, ImageJobBackend, ImageService, ImageSubject,
    JobCompletionNotifier, PollingNotifier, S3ObjectStore, Templates, WorkflowTemplate,
};
use shopseed_store::Store;
use tracing::info;

use crate::config::{ImagesConfig, ServerConfig};
use crate::error::ServerError;

pub type SharedState = Arc<AppState>;

/// Clients shared by every request, built once at start.
pub struct AppState {
    pub config: ServerConfig,
    pub store: Store,
    pub backend: Arc<dyn TextBackend>,
    pub sleeper: Arc<dyn Sleeper>,
    pub images: Arc<ImageService>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Store,
        backend: Arc<dyn TextBackend>,
        sleeper: Arc<dyn Sleeper>,
        images: Arc<ImageService>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
            sleeper,
            images,
        }
    }

    /// Connect to Postgres and construct the text, image and storage clients.
    pub async fn build(config: ServerConfig) -> Result<Self, ServerError> {
        let store = Store::connect(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;
        if config.database.migrate_on_start {
            store.migrate().await?;
        }

        let backend: Arc<dyn TextBackend> = Arc::new(OpenAiBackend::new(config.llm.openai())?);
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

        let jobs: Arc<dyn ImageJobBackend> = Arc::new(HttpJobBackend::new(
            reqwest::Client::new(),
            config.images.base_url.clone(),
            config.images.token.clone(),
        ));
        let notifier: Arc<dyn JobCompletionNotifier> = match config.images.mode {
            CompletionMode::Polling => Arc::new(PollingNotifier::new(
                jobs,
                sleeper.clone(),
                config.images.poll_attempts,
                config.images.poll_interval(),
            )),
            CompletionMode::Callback => {
                Arc::new(CallbackNotifier::new(jobs, config.images.public_url.clone()))
            }
        };
        let storage =
            S3ObjectStore::from_env(config.storage.bucket.clone(), config.storage.region.clone())
                .await;
        let images = ImageService::new(
            notifier,
            Arc::new(storage),
            Arc::new(store.clone()),
            load_templates(&config.images)?,
        );

        info!(
            event = "state_ready",
            model = %config.llm.model,
            stream = config.llm.stream,
            image_mode = ?config.images.mode,
            bucket = %config.storage.bucket
        );
        Ok(Self::new(
            config,
            store,
            backend,
            sleeper,
            Arc::new(images),
        ))
    }
}

/// Workflow files from config, falling back to the bundled templates.
pub fn load_templates(config: &ImagesConfig) -> Result<Templates, ServerError> {
    let load = |path: &Option<String>, subject| match path {
        Some(path) => WorkflowTemplate::load(Path::new(path), config.prompt_node.clone()),
        None => WorkflowTemplate::bundled(subject),
    };
    Ok(Templates {
        user: load(&config.user_workflow, ImageSubject::User)?,
        product: load(&config.product_workflow, ImageSubject::Product)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_templates_are_used_without_paths() {
        let templates = load_templates(&ImagesConfig::default()).unwrap();
        assert_eq!(templates.user.prompt_node(), "74");
        assert_eq!(templates.product.prompt_node(), "74");
    }

    #[test]
    fn missing_workflow_files_fail_startup() {
        let config = ImagesConfig {
            user_workflow: Some("/nonexistent/user.json".to_string()),
            ..ImagesConfig::default()
        };
        assert!(matches!(
            load_templates(&config),
            Err(ServerError::Media(_))
        ));
    }
}
