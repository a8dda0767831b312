use shopseed_generate::entities::{ProductEntity, describe_product};
use shopseed_store::{ProductRow, ProductSink};
use tracing::info;

use super::generator;
use crate::error::ApiError;
use crate::state::AppState;

/// Generate and store `requested` products, or the configured default.
pub async fn generate_products(
    state: &AppState,
    requested: Option<usize>,
) -> Result<Vec<ProductRow>, ApiError> {
    let defaults = state.config.generation.products;
    let total = requested.unwrap_or(defaults.total);
    let generator = generator(
        state,
        ProductEntity::default(),
        state.config.llm.max_tokens.products,
    );

    let mut sink = ProductSink::new(state.store.clone());
    let result = generator.generate(total, defaults.chunk, &mut sink).await;
    match result {
        Ok(report) => {
            info!(
                event = "products_generated",
                requested = total,
                stored = sink.inserted.len(),
                dropped = report.dropped,
                retries = report.retries
            );
            Ok(sink.inserted)
        }
        Err(failure) => Err(ApiError::interrupted(sink.inserted.len(), failure.error)),
    }
}

pub async fn describe(state: &AppState, details: &str) -> Result<String, ApiError> {
    if details.trim().is_empty() {
        return Err(ApiError::BadRequest("details must not be empty".to_string()));
    }
    Ok(describe_product(state.backend.as_ref(), details).await?)
}
