use std::future::Future;

use rand::Rng;
use tracing::warn;

use crate::error::{Result, StoreError};

/// Attempts per record before a uniqueness conflict drops it.
pub const MAX_UNIQUE_ATTEMPTS: u32 = 10;

/// Identity-bearing fields of a user, the ones covered by unique constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniqueOutcome<T> {
    Inserted { row: T, attempts: u32 },
    /// Every attempt hit a uniqueness conflict; the record was skipped.
    Dropped { attempts: u32, constraint: String },
}

/// `alice@example.com` with suffix 1234 becomes `alice+1234@example.com`.
pub fn suffixed_email(email: &str, suffix: u32) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}+{suffix}@{domain}"),
        None => format!("{email}+{suffix}"),
    }
}

pub fn suffixed_username(username: &str, suffix: u32) -> String {
    format!("{username}_{suffix}")
}

/// Next candidate after a conflict on `constraint`.
///
/// Suffixes are always derived from the generated identity so they never
/// accumulate. An unrecognised constraint varies both fields.
fn next_candidate(
    original: &Identity,
    current: &Identity,
    constraint: &str,
    suffix: u32,
) -> Identity {
    let email_clash = constraint.contains("email");
    let username_clash = constraint.contains("username");
    let both = !email_clash && !username_clash;
    Identity {
        username: if username_clash || both {
            suffixed_username(&original.username, suffix)
        } else {
            current.username.clone()
        },
        email: if email_clash || both {
            suffixed_email(&original.email, suffix)
        } else {
            current.email.clone()
        },
    }
}

/// Insert one record, varying its identity after each uniqueness conflict.
///
/// Other store errors propagate unchanged. The varied values are not checked
/// against the generator's schema again.
pub async fn insert_with_unique_retry<T, R, F, Fut>(
    identity: Identity,
    rng: &mut R,
    max_attempts: u32,
    mut insert: F,
) -> Result<UniqueOutcome<T>>
where
    R: Rng,
    F: FnMut(Identity) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut candidate = identity.clone();
    let mut last_constraint = String::new();

    for attempt in 1..=max_attempts {
        match insert(candidate.clone()).await {
            Ok(row) => {
                return Ok(UniqueOutcome::Inserted {
                    row,
                    attempts: attempt,
                });
            }
            Err(StoreError::UniqueViolation { constraint }) => {
                let suffix = rng.random_range(1000..=9999);
                candidate = next_candidate(&identity, &candidate, &constraint, suffix);
                warn!(
                    event = "unique_conflict",
                    attempt,
                    constraint = %constraint,
                    username = %candidate.username,
                    email = %candidate.email,
                    "retrying with suffixed identity"
                );
                last_constraint = constraint;
            }
            Err(err) => return Err(err),
        }
    }

    warn!(
        event = "record_dropped",
        username = %identity.username,
        email = %identity.email,
        attempts = max_attempts,
        "uniqueness conflicts exhausted"
    );
    Ok(UniqueOutcome::Dropped {
        attempts: max_attempts,
        constraint: last_constraint,
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn alice() -> Identity {
        Identity {
            username: "alice123".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    fn conflict(constraint: &str) -> StoreError {
        StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }

    #[test]
    fn email_suffix_goes_before_the_domain() {
        assert_eq!(suffixed_email("alice@example.com", 1234), "alice+1234@example.com");
        assert_eq!(suffixed_email("a@b@c.io", 1000), "a@b+1000@c.io");
        assert_eq!(suffixed_username("alice123", 4321), "alice123_4321");
    }

    #[test]
    fn only_the_clashing_field_changes() {
        let original = alice();
        let next = next_candidate(&original, &original, "users_email_key", 5555);
        assert_eq!(next.username, "alice123");
        assert_eq!(next.email, "alice+5555@example.com");

        let next = next_candidate(&original, &original, "", 5555);
        assert_eq!(next.username, "alice123_5555");
        assert_eq!(next.email, "alice+5555@example.com");
    }

    #[tokio::test]
    async fn email_conflict_is_retried_with_a_four_digit_suffix() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = Vec::new();

        let outcome = insert_with_unique_retry(alice(), &mut rng, MAX_UNIQUE_ATTEMPTS, |identity| {
            seen.push(identity.clone());
            let first = seen.len() == 1;
            async move {
                if first {
                    Err(conflict("users_email_key"))
                } else {
                    Ok(identity)
                }
            }
        })
        .await
        .unwrap();

        let UniqueOutcome::Inserted { row, attempts } = outcome else {
            panic!("expected insert");
        };
        assert_eq!(attempts, 2);
        assert_eq!(seen[0], alice());
        let (local, domain) = row.email.split_once('@').unwrap();
        assert_eq!(domain, "example.com");
        let suffix = local.strip_prefix("alice+").unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(row.username, "alice123");
    }

    #[tokio::test]
    async fn persistent_conflicts_drop_the_record_after_the_ceiling() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut calls = 0;
        let outcome = insert_with_unique_retry(alice(), &mut rng, MAX_UNIQUE_ATTEMPTS, |_| {
            calls += 1;
            async { Err::<(), _>(conflict("users_username_key")) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 10);
        assert_eq!(
            outcome,
            UniqueOutcome::Dropped {
                attempts: 10,
                constraint: "users_username_key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn other_errors_propagate_immediately() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut calls = 0;
        let err = insert_with_unique_retry(alice(), &mut rng, MAX_UNIQUE_ATTEMPTS, |_| {
            calls += 1;
            async {
                Err::<(), _>(StoreError::NotFound {
                    entity: "user",
                    id: 1,
                })
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(calls, 1);
    }
}
