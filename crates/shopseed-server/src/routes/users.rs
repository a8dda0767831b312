use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use shopseed_store::UserRow;

use super::optional_body;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::services;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateUsersBody {
    number_of_users: Option<usize>,
}

pub(super) fn routes() -> Router<SharedState> {
    Router::new().route("/users/generate-users", post(generate_users))
}

async fn generate_users(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<ApiResponse<Vec<UserRow>>, ApiError> {
    let body: GenerateUsersBody = optional_body(&body)?;
    let generated = services::users::generate_users(&state, body.number_of_users).await?;
    let message = format!(
        "{} users generated, {} dropped on duplicate identities",
        generated.rows.len(),
        generated.dropped
    );
    Ok(ApiResponse::list(generated.rows).with_message(message))
}
