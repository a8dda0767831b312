use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use shopseed_store::ProductRow;

use super::optional_body;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::services;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateProductsBody {
    number_of_products: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DescribeBody {
    #[serde(default)]
    details: String,
}

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/products/generate-products", post(generate_products))
        .route("/products/describe", post(describe))
}

async fn generate_products(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<ApiResponse<Vec<ProductRow>>, ApiError> {
    let body: GenerateProductsBody = optional_body(&body)?;
    let rows = services::products::generate_products(&state, body.number_of_products).await?;
    let message = format!("{} products generated", rows.len());
    Ok(ApiResponse::list(rows).with_message(message))
}

async fn describe(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<ApiResponse<String>, ApiError> {
    let body: DescribeBody = optional_body(&body)?;
    let description = services::products::describe(&state, &body.details).await?;
    Ok(ApiResponse::new(1, description))
}
