//! Full seeding run across every entity kind.
//!
//! Stages run one after another in a fixed order. A failing stage is logged
//! and recorded in the report; the run always continues with the next one.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::services;
use crate::state::SharedState;

/// One step of the setup run. Returns the number of records it created.
#[async_trait]
pub trait SetupStage: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<usize, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StageOutcome {
    Completed {
        count: usize,
    },
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        committed: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: String,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub stages: Vec<StageReport>,
}

impl SetupReport {
    pub fn failed(&self) -> usize {
        self.stages
            .iter()
            .filter(|stage| matches!(stage.outcome, StageOutcome::Failed { .. }))
            .count()
    }

    /// Records created across all stages, including partial commits.
    pub fn created(&self) -> usize {
        self.stages
            .iter()
            .map(|stage| match stage.outcome {
                StageOutcome::Completed { count } => count,
                StageOutcome::Failed { committed, .. } => committed.unwrap_or(0),
            })
            .sum()
    }
}

pub async fn run_setup(stages: &[Box<dyn SetupStage>]) -> SetupReport {
    let mut report = SetupReport::default();
    for (position, stage) in stages.iter().enumerate() {
        let started = Instant::now();
        info!(event = "setup_stage_started", stage = stage.name(), step = position + 1);
        let outcome = match stage.run().await {
            Ok(count) => {
                info!(event = "setup_stage_completed", stage = stage.name(), count);
                StageOutcome::Completed { count }
            }
            Err(err) => {
                warn!(event = "setup_stage_failed", stage = stage.name(), error = %err);
                StageOutcome::Failed {
                    error: err.to_string(),
                    committed: err.committed(),
                }
            }
        };
        report.stages.push(StageReport {
            stage: stage.name().to_string(),
            outcome,
            elapsed_ms: started.elapsed().as_millis(),
        });
    }
    info!(
        event = "setup_finished",
        stages = report.stages.len(),
        failed = report.failed(),
        created = report.created()
    );
    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStep {
    Products,
    ProductImages,
    Users,
    UserImages,
    Addresses,
    Reviews,
    Orders,
    OrderItems,
    Payments,
}

impl SeedStep {
    pub const ALL: [SeedStep; 9] = [
        SeedStep::Products,
        SeedStep::ProductImages,
        SeedStep::Users,
        SeedStep::UserImages,
        SeedStep::Addresses,
        SeedStep::Reviews,
        SeedStep::Orders,
        SeedStep::OrderItems,
        SeedStep::Payments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SeedStep::Products => "products",
            SeedStep::ProductImages => "product_images",
            SeedStep::Users => "users",
            SeedStep::UserImages => "user_images",
            SeedStep::Addresses => "addresses",
            SeedStep::Reviews => "reviews",
            SeedStep::Orders => "orders",
            SeedStep::OrderItems => "order_items",
            SeedStep::Payments => "payments",
        }
    }
}

/// A seeding step bound to the application state.
pub struct SeedStage {
    step: SeedStep,
    state: SharedState,
}

#[async_trait]
impl SetupStage for SeedStage {
    fn name(&self) -> &str {
        self.step.name()
    }

    async fn run(&self) -> Result<usize, ApiError> {
        let state = self.state.as_ref();
        let generation = &state.config.generation;
        let count = match self.step {
            SeedStep::Products => {
                services::products::generate_products(state, Some(generation.setup_products))
                    .await?
                    .len()
            }
            SeedStep::ProductImages => services::images::missing_product_images(state).await?.len(),
            SeedStep::Users => {
                services::users::generate_users(state, Some(generation.setup_users))
                    .await?
                    .rows
                    .len()
            }
            SeedStep::UserImages => services::images::missing_user_images(state).await?.len(),
            SeedStep::Addresses => services::addresses::generate_missing_addresses(state)
                .await?
                .len(),
            SeedStep::Reviews => services::reviews::generate_reviews(state).await?.len(),
            SeedStep::Orders => services::orders::generate_orders(state).await?.len(),
            SeedStep::OrderItems => services::order_items::generate_missing_order_items(state)
                .await?
                .len(),
            SeedStep::Payments => services::payments::generate_payments(state).await?.len(),
        };
        Ok(count)
    }
}

/// Every seeding step in dependency order.
pub fn seed_stages(state: &SharedState) -> Vec<Box<dyn SetupStage>> {
    SeedStep::ALL
        .into_iter()
        .map(|step| {
            Box::new(SeedStage {
                step,
                state: state.clone(),
            }) as Box<dyn SetupStage>
        })
        .collect()
}
