use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use shopseed_media::{ImageOutcome, ImageSubject, JobCallback};

use super::json_body;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::services::images::{self, ImageResult};
use crate::state::SharedState;

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/users/images/generate-by-id/{id}", post(user_image))
        .route("/users/images/generate-missing", post(missing_user_images))
        .route("/users/images/callback", post(user_callback))
        .route("/products/images/generate-by-id/{id}", post(product_image))
        .route(
            "/products/images/generate-missing",
            post(missing_product_images),
        )
        .route("/products/images/callback", post(product_callback))
}

fn single(
    subject: ImageSubject,
    id: i64,
    outcome: Option<ImageOutcome>,
) -> ApiResponse<Option<ImageOutcome>> {
    match outcome {
        Some(outcome) => ApiResponse::new(1, Some(outcome)),
        None => ApiResponse::new(0, None).with_message(format!("{subject} {id} already has an image")),
    }
}

async fn user_image(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Option<ImageOutcome>>, ApiError> {
    let outcome = images::user_image(&state, id).await?;
    Ok(single(ImageSubject::User, id, outcome))
}

async fn product_image(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Option<ImageOutcome>>, ApiError> {
    let outcome = images::product_image(&state, id).await?;
    Ok(single(ImageSubject::Product, id, outcome))
}

async fn missing_user_images(
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<ImageResult>>, ApiError> {
    Ok(ApiResponse::list(images::missing_user_images(&state).await?))
}

async fn missing_product_images(
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<ImageResult>>, ApiError> {
    Ok(ApiResponse::list(
        images::missing_product_images(&state).await?,
    ))
}

async fn callback(
    state: SharedState,
    subject: ImageSubject,
    body: Bytes,
) -> Result<ApiResponse<Option<String>>, ApiError> {
    let callback: JobCallback = json_body(&body)?;
    let stored = images::image_callback(&state, subject, &callback).await?;
    Ok(match stored {
        Some(url) => ApiResponse::new(1, Some(url)).with_message("image stored"),
        None => ApiResponse::new(0, None).with_message("callback ignored"),
    })
}

async fn user_callback(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<ApiResponse<Option<String>>, ApiError> {
    callback(state, ImageSubject::User, body).await
}

async fn product_callback(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<ApiResponse<Option<String>>, ApiError> {
    callback(state, ImageSubject::Product, body).await
}
