//! Seeding operations behind the HTTP routes and the setup run.
//!
//! Each function works against the shared [`AppState`] and returns the rows
//! it created. Failures after a partial commit carry the committed count.

pub mod addresses;
pub mod images;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod users;

use shopseed_generate::{ChunkedGenerator, EntityKind};

use crate::state::AppState;

fn generator<E: EntityKind>(state: &AppState, entity: E, max_tokens: u32) -> ChunkedGenerator<E> {
    ChunkedGenerator::new(
        state.backend.clone(),
        state.sleeper.clone(),
        entity,
        state.config.generation.options(max_tokens),
    )
}
