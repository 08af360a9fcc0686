//! ============================================================================
//! Mining Gate - All-or-nothing admission check before mining
//! ============================================================================
//! Evaluates every pending transaction against the trigger conditions:
//! - every transaction passes -> the mine call may be issued
//! - any transaction fails -> mining is refused as a whole, and the
//!   offending transactions are reported for editing or deletion
//!
//! Qualifying transactions are never mined on their own.
//! ============================================================================

use serde::Serialize;
use tracing::{info, warn};

use crate::conditions::TriggerConditions;
use crate::evaluator::evaluate;
use crate::types::PendingTransaction;

/// Result of a gate check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiningDecision {
    pub allowed: bool,
    /// Failing transactions, in input order
    pub offending: Vec<PendingTransaction>,
    pub reason: String,
}

/// Gate holding the conditions that pending transactions are checked against
#[derive(Debug, Clone, Default)]
pub struct MiningGate {
    conditions: TriggerConditions,
}

impl MiningGate {
    /// Gate with no conditions set; admits everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the given conditions
    pub fn with_conditions(conditions: TriggerConditions) -> Self {
        Self { conditions }
    }

    /// Check whether the pending set may be mined
    pub fn check(&self, pending: &[PendingTransaction]) -> MiningDecision {
        let offending: Vec<PendingTransaction> = pending
            .iter()
            .filter(|tx| !evaluate(tx, &self.conditions))
            .cloned()
            .collect();

        if offending.is_empty() {
            info!("Mining gate open: {} pending transactions meet conditions", pending.len());
            MiningDecision {
                allowed: true,
                offending,
                reason: format!(
                    "All {} pending transactions meet the trigger conditions",
                    pending.len()
                ),
            }
        } else {
            warn!(
                "Mining gate closed: {} of {} pending transactions fail conditions",
                offending.len(),
                pending.len()
            );
            MiningDecision {
                allowed: false,
                reason: format!(
                    "{} of {} pending transactions do not meet the trigger conditions. \
                     Update or delete them before mining.",
                    offending.len(),
                    pending.len()
                ),
                offending,
            }
        }
    }

    /// Get current conditions
    pub fn conditions(&self) -> &TriggerConditions {
        &self.conditions
    }

    /// Replace the conditions
    pub fn update_conditions(&mut self, conditions: TriggerConditions) {
        info!("Mining gate conditions updated: {}", conditions);
        self.conditions = conditions;
    }
}

/// Decide whether the pending set may be mined under the given conditions
pub fn can_mine(pending: &[PendingTransaction], conditions: &TriggerConditions) -> MiningDecision {
    MiningGate::with_conditions(*conditions).check(pending)
}
