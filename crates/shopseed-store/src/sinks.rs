use std::collections::VecDeque;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use shopseed_generate::entities::{AddressRecord, ProductRecord, ReviewRecord, UserRecord};
use shopseed_generate::{Sink, SinkError};
use tracing::{info, warn};

use crate::models::{AddressRow, ProductRow, ReviewRow, UserRow};
use crate::store::Store;
use crate::unique::{Identity, MAX_UNIQUE_ATTEMPTS, UniqueOutcome, insert_with_unique_retry};

/// Persists product batches as they arrive.
pub struct ProductSink {
    store: Store,
    pub inserted: Vec<ProductRow>,
}

impl ProductSink {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            inserted: Vec::new(),
        }
    }
}

#[async_trait]
impl Sink<ProductRecord> for ProductSink {
    async fn accept(&mut self, batch: Vec<ProductRecord>) -> Result<(), SinkError> {
        let rows = self
            .store
            .insert_products(&batch)
            .await
            .map_err(SinkError::new)?;
        info!(event = "products_persisted", count = rows.len());
        self.inserted.extend(rows);
        Ok(())
    }
}

/// Persists users one by one, resolving username/email conflicts.
pub struct UserSink {
    store: Store,
    rng: StdRng,
    pub inserted: Vec<UserRow>,
    /// Records skipped after exhausting uniqueness retries.
    pub dropped: usize,
}

impl UserSink {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            rng: StdRng::from_os_rng(),
            inserted: Vec::new(),
            dropped: 0,
        }
    }
}

#[async_trait]
impl Sink<UserRecord> for UserSink {
    async fn accept(&mut self, batch: Vec<UserRecord>) -> Result<(), SinkError> {
        for record in &batch {
            let identity = Identity {
                username: record.username.clone(),
                email: record.email.clone(),
            };
            let store = &self.store;
            let outcome = insert_with_unique_retry(
                identity,
                &mut self.rng,
                MAX_UNIQUE_ATTEMPTS,
                |candidate| async move { store.insert_user(record, &candidate).await },
            )
            .await
            .map_err(SinkError::new)?;
            match outcome {
                UniqueOutcome::Inserted { row, .. } => self.inserted.push(row),
                UniqueOutcome::Dropped { .. } => self.dropped += 1,
            }
        }
        Ok(())
    }
}

/// Split generated addresses into groups of `per_user`, one group per user,
/// in user order. Returns the groups and the leftover addresses.
pub fn assign_addresses(
    users: &mut VecDeque<i64>,
    pending: &mut Vec<AddressRecord>,
    per_user: usize,
) -> Vec<(i64, Vec<AddressRecord>)> {
    let mut groups = Vec::new();
    if per_user == 0 {
        return groups;
    }
    while pending.len() >= per_user {
        let Some(user_id) = users.pop_front() else {
            break;
        };
        let group: Vec<AddressRecord> = pending.drain(..per_user).collect();
        groups.push((user_id, group));
    }
    groups
}

/// Hands generated addresses to users that have none, `per_user` at a time.
pub struct AddressSink {
    store: Store,
    users: VecDeque<i64>,
    per_user: usize,
    pending: Vec<AddressRecord>,
    pub inserted: Vec<AddressRow>,
}

impl AddressSink {
    pub fn new(store: Store, users: Vec<i64>, per_user: usize) -> Self {
        Self {
            store,
            users: users.into(),
            per_user,
            pending: Vec::new(),
            inserted: Vec::new(),
        }
    }

    /// Users still waiting for addresses.
    pub fn unassigned_users(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl Sink<AddressRecord> for AddressSink {
    async fn accept(&mut self, batch: Vec<AddressRecord>) -> Result<(), SinkError> {
        self.pending.extend(batch);
        for (user_id, group) in assign_addresses(&mut self.users, &mut self.pending, self.per_user)
        {
            let rows = self
                .store
                .insert_addresses(user_id, &group)
                .await
                .map_err(SinkError::new)?;
            self.inserted.extend(rows);
        }
        if self.users.is_empty() && !self.pending.is_empty() {
            warn!(
                event = "addresses_unused",
                count = self.pending.len(),
                "more addresses generated than users need"
            );
            self.pending.clear();
        }
        Ok(())
    }
}

pub struct ReviewSink {
    store: Store,
    pub inserted: Vec<ReviewRow>,
}

impl ReviewSink {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            inserted: Vec::new(),
        }
    }
}

#[async_trait]
impl Sink<ReviewRecord> for ReviewSink {
    async fn accept(&mut self, batch: Vec<ReviewRecord>) -> Result<(), SinkError> {
        let rows = self
            .store
            .insert_reviews(&batch)
            .await
            .map_err(SinkError::new)?;
        self.inserted.extend(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(label: &str) -> AddressRecord {
        AddressRecord {
            label: label.to_string(),
            address1: "1 Main St".to_string(),
            address2: String::new(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zipcode: "62704".to_string(),
            country: "USA".to_string(),
        }
    }

    #[test]
    fn addresses_are_paired_in_user_order() {
        let mut users: VecDeque<i64> = vec![4, 9, 12].into();
        let mut pending: Vec<_> = ["a", "b", "c"].into_iter().map(address).collect();

        let groups = assign_addresses(&mut users, &mut pending, 2);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, 4);
        assert_eq!(groups[0].1[1].label, "b");
        assert_eq!(pending.len(), 1);

        pending.extend(["d", "e", "f"].into_iter().map(address));
        let groups = assign_addresses(&mut users, &mut pending, 2);
        let owners: Vec<_> = groups.iter().map(|(user, _)| *user).collect();
        assert_eq!(owners, vec![9, 12]);
        assert_eq!(groups[0].1[0].label, "c");
        assert!(users.is_empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn leftovers_stay_pending_once_users_run_out() {
        let mut users: VecDeque<i64> = vec![1].into();
        let mut pending: Vec<_> = ["a", "b", "c", "d"].into_iter().map(address).collect();
        let groups = assign_addresses(&mut users, &mut pending, 2);
        assert_eq!(groups.len(), 1);
        assert_eq!(pending.len(), 2);
    }
}
