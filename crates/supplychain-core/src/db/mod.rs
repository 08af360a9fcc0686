// ============================================================================
// Condition Store - Durable trigger-condition persistence
// ============================================================================
// Trigger conditions are a client-side admission policy, not part of the
// ledger, so they live in a local key-value store under one fixed key.
// Default backend: ~/.supplychain/client.redb (see ClientDb)
// ============================================================================

mod memory;
mod store;

pub use memory::MemoryStore;
pub use store::{default_db_path, ClientDb};

use tracing::{debug, info};

use crate::conditions::{ConditionsForm, TriggerConditions};
use crate::error::{Result, SupplyChainError};

/// Key the serialized conditions are stored under
pub const CONDITIONS_KEY: &str = "triggerConditions";

/// String-keyed durable storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Loads and saves trigger conditions through a key-value store
pub struct ConditionStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ConditionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persisted conditions, or unset conditions if none were ever saved
    pub fn load(&self) -> Result<TriggerConditions> {
        match self.store.get(CONDITIONS_KEY)? {
            Some(raw) => {
                let conditions: TriggerConditions = serde_json::from_str(&raw).map_err(|e| {
                    SupplyChainError::Storage(format!("Failed to decode trigger conditions: {}", e))
                })?;
                debug!("Loaded trigger conditions: {}", conditions);
                Ok(conditions)
            }
            None => {
                debug!("No trigger conditions saved; using unset conditions");
                Ok(TriggerConditions::unset())
            }
        }
    }

    /// Replace the persisted conditions. All three thresholds are required;
    /// a rejected save leaves the stored value untouched.
    pub fn save(&self, conditions: &TriggerConditions) -> Result<()> {
        conditions.ensure_complete()?;

        let value = serde_json::to_string(conditions).map_err(|e| {
            SupplyChainError::Storage(format!("Failed to serialize trigger conditions: {}", e))
        })?;
        self.store.set(CONDITIONS_KEY, &value)?;

        info!("Saved trigger conditions: {}", conditions);
        Ok(())
    }

    /// Parse operator input and save it
    pub fn save_form(&self, form: &ConditionsForm) -> Result<TriggerConditions> {
        let conditions = form.parse()?;
        self.save(&conditions)?;
        Ok(conditions)
    }

    /// Underlying key-value store
    pub fn store(&self) -> &S {
        &self.store
    }
}
