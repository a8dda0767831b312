//! PostgreSQL persistence for shopseed.
//!
//! [`Store`] wraps a sqlx pool and exposes the queries the seeding stages
//! need. The sinks in [`sinks`] plug the store into the chunked generator.

pub mod error;
pub mod models;
mod queries;
pub mod sinks;
pub mod store;
pub mod unique;

pub use error::{Result, StoreError};
pub use models::{
    AddressRow, NewOrderItem, OrderItemRow, OrderRow, OrderStatus, PaymentRow, PaymentStatus,
    PricedProduct, ProductRow, ProductSummary, ReviewRow, UserAddresses, UserRow,
};
pub use sinks::{AddressSink, ProductSink, ReviewSink, UserSink};
pub use store::Store;
pub use unique::{Identity, MAX_UNIQUE_ATTEMPTS, UniqueOutcome, insert_with_unique_retry};
