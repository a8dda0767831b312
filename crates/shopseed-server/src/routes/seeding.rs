use axum::Router;
use axum::extract::State;
use axum::routing::post;
use shopseed_store::{AddressRow, OrderRow, PaymentRow, ReviewRow};

use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::services;
use crate::setup::{SetupReport, run_setup, seed_stages};
use crate::state::SharedState;

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/addresses/generate-missing", post(addresses))
        .route("/reviews/generate-reviews", post(reviews))
        .route("/orders/generate", post(orders))
        .route("/order-items/generate-missing", post(order_items))
        .route("/payments/generate", post(payments))
        .route("/setup/all", post(setup_all))
}

async fn addresses(
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<AddressRow>>, ApiError> {
    let rows = services::addresses::generate_missing_addresses(&state).await?;
    Ok(ApiResponse::list(rows))
}

async fn reviews(State(state): State<SharedState>) -> Result<ApiResponse<Vec<ReviewRow>>, ApiError> {
    let rows = services::reviews::generate_reviews(&state).await?;
    Ok(ApiResponse::list(rows))
}

async fn orders(State(state): State<SharedState>) -> Result<ApiResponse<Vec<OrderRow>>, ApiError> {
    let rows = services::orders::generate_orders(&state).await?;
    Ok(ApiResponse::list(rows))
}

async fn order_items(
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<OrderRow>>, ApiError> {
    let rows = services::order_items::generate_missing_order_items(&state).await?;
    Ok(ApiResponse::list(rows).with_message("orders filled with items"))
}

async fn payments(
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<PaymentRow>>, ApiError> {
    let rows = services::payments::generate_payments(&state).await?;
    Ok(ApiResponse::list(rows))
}

async fn setup_all(State(state): State<SharedState>) -> ApiResponse<SetupReport> {
    let report = run_setup(&seed_stages(&state)).await;
    let message = format!(
        "setup finished: {} of {} stages failed",
        report.failed(),
        report.stages.len()
    );
    ApiResponse::new(report.created(), report).with_message(message)
}
