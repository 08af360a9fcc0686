//! ============================================================================
//! SUPPLYCHAIN-CORE: Trigger-condition gated ledger client
//! ============================================================================
//! This crate handles all logic behind the supply chain operator client:
//! - Trigger conditions and their durable store (redb)
//! - Per-transaction condition evaluation
//! - All-or-nothing mining gate
//! - Typed HTTP client for the remote ledger service
//! ============================================================================

pub mod client;
pub mod conditions;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod mining_gate;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use client::{HttpSupplyChainClient, SupplyChainApi};
pub use conditions::{ConditionsForm, TriggerConditions};
pub use config::ClientConfig;
pub use db::{ClientDb, ConditionStore, KeyValueStore, MemoryStore};
pub use error::{Result, SupplyChainError, ValidationError};
pub use evaluator::{evaluate, evaluate_detailed, ConditionReport, RuleOutcome};
pub use mining_gate::{can_mine, MiningDecision, MiningGate};
pub use session::{MineOutcome, OperatorSession, PendingView};
pub use types::*;
