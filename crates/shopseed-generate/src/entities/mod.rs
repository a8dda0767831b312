//! Entity kinds the generator knows how to produce.

mod address;
mod product;
mod review;
mod user;

pub use address::{AddressEntity, AddressRecord};
pub use product::{ProductEntity, ProductRecord, describe_product};
pub use review::{ReviewEntity, ReviewRecord, ReviewTarget};
pub use user::{Role, UserEntity, UserRecord};
