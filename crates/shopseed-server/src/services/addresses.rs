use shopseed_generate::entities::AddressEntity;
use shopseed_store::{AddressRow, AddressSink};
use tracing::{info, warn};

use super::generator;
use crate::error::ApiError;
use crate::state::AppState;

/// Give every user without an address `addresses_per_user` new ones.
pub async fn generate_missing_addresses(state: &AppState) -> Result<Vec<AddressRow>, ApiError> {
    let users = state.store.users_without_addresses().await?;
    if users.is_empty() {
        info!(event = "addresses_up_to_date");
        return Ok(Vec::new());
    }

    let config = &state.config.generation;
    let per_user = config.addresses_per_user;
    let total = users.len() * per_user;
    let generator = generator(
        state,
        AddressEntity::default(),
        state.config.llm.max_tokens.addresses,
    );

    let mut sink = AddressSink::new(state.store.clone(), users, per_user);
    let result = generator.generate(total, config.address_chunk, &mut sink).await;
    if let Err(failure) = result {
        return Err(ApiError::interrupted(sink.inserted.len(), failure.error));
    }
    if sink.unassigned_users() > 0 {
        warn!(
            event = "addresses_incomplete",
            users = sink.unassigned_users(),
            "some users are still without addresses"
        );
    }
    info!(event = "addresses_generated", stored = sink.inserted.len());
    Ok(sink.inserted)
}
