use shopseed_generate::entities::UserEntity;
use shopseed_store::{UserRow, UserSink};
use tracing::info;

use super::generator;
use crate::error::ApiError;
use crate::state::AppState;

/// Users created by one run, plus those dropped on identity clashes.
#[derive(Debug)]
pub struct GeneratedUsers {
    pub rows: Vec<UserRow>,
    pub dropped: usize,
}

pub async fn generate_users(
    state: &AppState,
    requested: Option<usize>,
) -> Result<GeneratedUsers, ApiError> {
    let defaults = state.config.generation.users;
    let total = requested.unwrap_or(defaults.total);
    let generator = generator(state, UserEntity::default(), state.config.llm.max_tokens.users);

    let mut sink = UserSink::new(state.store.clone());
    let result = generator.generate(total, defaults.chunk, &mut sink).await;
    match result {
        Ok(report) => {
            info!(
                event = "users_generated",
                requested = total,
                stored = sink.inserted.len(),
                conflicts_dropped = sink.dropped,
                invalid_dropped = report.dropped
            );
            Ok(GeneratedUsers {
                rows: sink.inserted,
                dropped: sink.dropped,
            })
        }
        Err(failure) => Err(ApiError::interrupted(sink.inserted.len(), failure.error)),
    }
}
