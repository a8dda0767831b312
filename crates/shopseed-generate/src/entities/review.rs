use std::fmt::Write;

use serde::{Deserialize, Serialize};
use shopseed_core::{FieldSpec, RecordSchema};

use crate::engine::{Directives, EntityKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub user_id: i64,
    pub product_id: i64,
    pub star_rating: i32,
    pub comment: String,
}

/// Product a user is asked to review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTarget {
    pub product_id: i64,
    pub name: String,
    pub description: String,
}

/// Reviews written by one user for a fixed set of products.
#[derive(Debug, Clone)]
pub struct ReviewEntity {
    schema: RecordSchema,
    user_id: i64,
    targets: Vec<ReviewTarget>,
}

impl ReviewEntity {
    pub fn new(user_id: i64, targets: Vec<ReviewTarget>) -> Self {
        Self {
            schema: RecordSchema::new("review")
                .field(FieldSpec::integer("userId", 1, i64::MAX))
                .field(FieldSpec::integer("productId", 1, i64::MAX))
                .field(FieldSpec::integer("starRating", 1, 5))
                .field(FieldSpec::defaulted("comment", "")),
            user_id,
            targets,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn targets(&self) -> &[ReviewTarget] {
        &self.targets
    }
}

impl EntityKind for ReviewEntity {
    type Record = ReviewRecord;

    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn directives(&self, count: usize) -> Directives {
        let system = format!(
            "You only output valid JSON arrays of product reviews.
No extra text, code blocks, or partial objects.
Each review has these keys: \"userId\", \"productId\", \"starRating\", \"comment\".

Rules:
1. starRating is an integer from 1 to 5.
2. comment mentions the product name or description in 2-3 sentences.
3. userId and productId are copied exactly from the input.
4. Return only a JSON array of length {count}, without trailing commas or commentary."
        );

        let mut user = format!(
            "Write {count} product reviews for userId = {}.\n\
             Each item is {{ \"userId\": <as given>, \"productId\": <as given>, \
             \"starRating\": <1..5>, \"comment\": <short paragraph> }}.\n\nProducts:\n",
            self.user_id
        );
        for (position, target) in self.targets.iter().take(count).enumerate() {
            let _ = writeln!(
                user,
                "{}) productId={}, productName={:?}, productDescription={:?}",
                position + 1,
                target.product_id,
                target.name,
                target.description
            );
        }
        let _ = write!(
            user,
            "\nReturn a JSON array with exactly {count} objects matching the userId/productId pairs above."
        );

        Directives { system, user }
    }

    fn max_tokens(&self) -> u32 {
        3_000
    }

    /// Only requested pairs, each at most once.
    fn keep(&self, record: &ReviewRecord, kept: &[ReviewRecord]) -> bool {
        record.user_id == self.user_id
            && self
                .targets
                .iter()
                .any(|target| target.product_id == record.product_id)
            && !kept.iter().any(|seen| seen.product_id == record.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> ReviewEntity {
        ReviewEntity::new(
            7,
            vec![
                ReviewTarget {
                    product_id: 14,
                    name: "Desk Lamp".to_string(),
                    description: "A warm light.".to_string(),
                },
                ReviewTarget {
                    product_id: 15,
                    name: "Chair".to_string(),
                    description: String::new(),
                },
            ],
        )
    }

    fn review(user_id: i64, product_id: i64) -> ReviewRecord {
        ReviewRecord {
            user_id,
            product_id,
            star_rating: 4,
            comment: "Nice.".to_string(),
        }
    }

    #[test]
    fn keeps_only_requested_pairs() {
        let entity = entity();
        assert!(entity.keep(&review(7, 14), &[]));
        assert!(!entity.keep(&review(8, 14), &[]));
        assert!(!entity.keep(&review(7, 99), &[]));
    }

    #[test]
    fn repeated_products_are_dropped() {
        let entity = entity();
        let kept = vec![review(7, 14)];
        assert!(!entity.keep(&review(7, 14), &kept));
        assert!(entity.keep(&review(7, 15), &kept));
    }

    #[test]
    fn directives_list_each_product() {
        let directives = entity().directives(2);
        assert!(directives.user.contains("userId = 7"));
        assert!(directives.user.contains("1) productId=14, productName=\"Desk Lamp\""));
        assert!(directives.user.contains("2) productId=15"));
    }
}
