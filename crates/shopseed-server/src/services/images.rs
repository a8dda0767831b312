use serde::Serialize;
use shopseed_media::{
    ImageOutcome, ImageSubject, ImageTarget, JobCallback, product_image_prompt, user_image_prompt,
};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Image result for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub id: i64,
    #[serde(flatten)]
    pub outcome: ImageOutcome,
}

fn has_image(url: &Option<String>) -> bool {
    url.as_deref().is_some_and(|url| !url.is_empty())
}

/// Generate a portrait for user `id`. Returns `None` when one already exists.
pub async fn user_image(state: &AppState, id: i64) -> Result<Option<ImageOutcome>, ApiError> {
    let user = state.store.user(id).await?;
    if has_image(&user.image_url) {
        info!(event = "image_exists", target = %ImageTarget::user(id));
        return Ok(None);
    }
    let prompt = user_image_prompt(&user.first_name, &user.last_name, &user.role);
    Ok(Some(state.images.generate(ImageTarget::user(id), &prompt).await?))
}

pub async fn product_image(state: &AppState, id: i64) -> Result<Option<ImageOutcome>, ApiError> {
    let product = state.store.product(id).await?;
    if has_image(&product.image_url) {
        info!(event = "image_exists", target = %ImageTarget::product(id));
        return Ok(None);
    }
    let prompt = product_image_prompt(&product.prompt, &product.description);
    Ok(Some(
        state
            .images
            .generate(ImageTarget::product(id), &prompt)
            .await?,
    ))
}

/// Images for every user without one. Failures are logged per user.
pub async fn missing_user_images(state: &AppState) -> Result<Vec<ImageResult>, ApiError> {
    let users = state.store.users_without_image().await?;
    let mut results = Vec::with_capacity(users.len());
    for user in users {
        let target = ImageTarget::user(user.id);
        let prompt = user_image_prompt(&user.first_name, &user.last_name, &user.role);
        match state.images.generate(target, &prompt).await {
            Ok(outcome) => results.push(ImageResult {
                id: user.id,
                outcome,
            }),
            Err(err) => warn!(event = "image_skipped", target = %target, error = %err),
        }
    }
    info!(event = "missing_images_processed", subject = "user", count = results.len());
    Ok(results)
}

pub async fn missing_product_images(state: &AppState) -> Result<Vec<ImageResult>, ApiError> {
    let products = state.store.products_without_image().await?;
    let mut results = Vec::with_capacity(products.len());
    for product in products {
        let target = ImageTarget::product(product.id);
        let prompt = product_image_prompt(&product.prompt, &product.description);
        match state.images.generate(target, &prompt).await {
            Ok(outcome) => results.push(ImageResult {
                id: product.id,
                outcome,
            }),
            Err(err) => warn!(event = "image_skipped", target = %target, error = %err),
        }
    }
    info!(event = "missing_images_processed", subject = "product", count = results.len());
    Ok(results)
}

/// Apply a job callback; `None` means it was ignored.
pub async fn image_callback(
    state: &AppState,
    subject: ImageSubject,
    callback: &JobCallback,
) -> Result<Option<String>, ApiError> {
    Ok(state.images.handle_callback(subject, callback).await?)
}
