//! ============================================================================
//! Operator Session - Action handlers over the ledger and local settings
//! ============================================================================
//! Holds the cached pending list and chain (the ledger owns the real ones;
//! the caches are refreshed after every mutating call) and routes the mine
//! action through the mining gate before the remote call is issued.
//! ============================================================================

use serde::Serialize;
use tracing::{info, warn};

use crate::client::SupplyChainApi;
use crate::conditions::{ConditionsForm, TriggerConditions};
use crate::db::{ConditionStore, KeyValueStore};
use crate::error::Result;
use crate::evaluator::{evaluate_detailed, ConditionReport};
use crate::mining_gate::{MiningDecision, MiningGate};
use crate::types::{MinedBlock, PendingTransaction, TransactionDraft, TransactionId};

/// What happened when the operator asked to mine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MineOutcome {
    /// The gate refused; no remote call was made
    Refused(MiningDecision),
    /// The ledger mined a block
    Mined { message: String },
}

/// A pending transaction with its trigger-condition evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingView {
    pub transaction: PendingTransaction,
    pub report: ConditionReport,
}

pub struct OperatorSession<A: SupplyChainApi, S: KeyValueStore> {
    api: A,
    conditions: ConditionStore<S>,
    pending: Vec<PendingTransaction>,
    chain: Vec<MinedBlock>,
}

impl<A: SupplyChainApi, S: KeyValueStore> OperatorSession<A, S> {
    pub fn new(api: A, store: S) -> Self {
        Self {
            api,
            conditions: ConditionStore::new(store),
            pending: Vec::new(),
            chain: Vec::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Cached pending transactions as of the last refresh
    pub fn pending(&self) -> &[PendingTransaction] {
        &self.pending
    }

    /// Cached chain as of the last refresh
    pub fn chain(&self) -> &[MinedBlock] {
        &self.chain
    }

    // ========================================================================
    // Ledger reads
    // ========================================================================

    pub async fn refresh_chain(&mut self) -> Result<&[MinedBlock]> {
        self.chain = self.api.get_chain().await?;
        Ok(&self.chain)
    }

    pub async fn refresh_pending(&mut self) -> Result<&[PendingTransaction]> {
        self.pending = self.api.get_pending_transactions().await?;
        Ok(&self.pending)
    }

    /// Pending transaction with the given id, from a fresh fetch
    pub async fn find_pending(&mut self, id: &TransactionId) -> Result<Option<PendingTransaction>> {
        self.refresh_pending().await?;
        Ok(self
            .pending
            .iter()
            .find(|tx| tx.id.as_ref() == Some(id))
            .cloned())
    }

    /// Fresh pending list, each row evaluated against the stored conditions
    pub async fn pending_with_reports(&mut self) -> Result<Vec<PendingView>> {
        let conditions = self.conditions.load()?;
        self.refresh_pending().await?;

        Ok(self
            .pending
            .iter()
            .map(|tx| PendingView {
                report: evaluate_detailed(tx, &conditions),
                transaction: tx.clone(),
            })
            .collect())
    }

    // ========================================================================
    // Transaction mutations
    // ========================================================================

    pub async fn create_transaction(&mut self, draft: &TransactionDraft) -> Result<String> {
        draft.validate()?;
        let message = self.api.create_transaction(draft).await?;
        self.refresh_pending().await?;
        Ok(message)
    }

    pub async fn update_transaction(
        &mut self,
        id: &TransactionId,
        draft: &TransactionDraft,
    ) -> Result<String> {
        draft.validate()?;
        let message = self.api.update_transaction(id, draft).await?;
        self.refresh_pending().await?;
        Ok(message)
    }

    pub async fn delete_transaction(&mut self, id: &TransactionId) -> Result<String> {
        let message = self.api.delete_transaction(id).await?;
        self.refresh_pending().await?;
        Ok(message)
    }

    // ========================================================================
    // Trigger conditions
    // ========================================================================

    pub fn conditions(&self) -> Result<TriggerConditions> {
        self.conditions.load()
    }

    pub fn save_conditions(&self, form: &ConditionsForm) -> Result<TriggerConditions> {
        self.conditions.save_form(form)
    }

    // ========================================================================
    // Mining
    // ========================================================================

    /// Gate decision over a fresh pending snapshot, without mining
    pub async fn check(&mut self) -> Result<MiningDecision> {
        let gate = MiningGate::with_conditions(self.conditions.load()?);
        self.refresh_pending().await?;
        Ok(gate.check(&self.pending))
    }

    /// Mine the pending set if every transaction meets the trigger conditions
    pub async fn mine(&mut self) -> Result<MineOutcome> {
        let decision = self.check().await?;
        if !decision.allowed {
            warn!("Mining refused: {}", decision.reason);
            return Ok(MineOutcome::Refused(decision));
        }

        let message = self.api.mine().await?;
        info!("Mined: {}", message);

        // Block is mined; refresh failures only leave the caches stale
        if let Err(e) = self.refresh_chain().await {
            warn!("Mined, but failed to refresh chain: {}", e);
        }
        if let Err(e) = self.refresh_pending().await {
            warn!("Mined, but failed to refresh pending transactions: {}", e);
        }
        Ok(MineOutcome::Mined { message })
    }

    /// Clear the remote chain and refresh both caches
    pub async fn clear(&mut self) -> Result<String> {
        let message = self.api.clear().await?;
        info!("Cleared: {}", message);

        self.refresh_chain().await?;
        self.refresh_pending().await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::SupplyChainError;
    use crate::types::{BlockTimestamp, TransactionRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory ledger that records which calls were made
    #[derive(Default)]
    struct FakeLedger {
        state: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        pending: Vec<PendingTransaction>,
        chain: Vec<MinedBlock>,
        next_id: u32,
        calls: Vec<String>,
        chain_unavailable: bool,
    }

    impl FakeLedger {
        fn with_pending(pending: Vec<PendingTransaction>) -> Self {
            let ledger = Self::default();
            ledger.state.lock().unwrap().pending = pending;
            ledger
        }

        fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        fn mine_calls(&self) -> usize {
            self.calls().iter().filter(|c| c.as_str() == "mine").count()
        }
    }

    fn record(id: Option<TransactionId>, draft: &TransactionDraft) -> TransactionRecord {
        TransactionRecord {
            id,
            sender: draft.sender.clone(),
            recipient: draft.recipient.clone(),
            product: draft.product.clone(),
            quantity: draft.quantity.clone(),
            location: draft.location.clone(),
            status: draft.status,
            temperature: draft.temperature.clone(),
            delivery_date: draft.delivery_date.clone(),
        }
    }

    #[async_trait]
    impl SupplyChainApi for FakeLedger {
        async fn get_chain(&self) -> Result<Vec<MinedBlock>> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("get_chain".into());
            if state.chain_unavailable {
                return Err(SupplyChainError::Network("connection reset".into()));
            }
            Ok(state.chain.clone())
        }

        async fn get_pending_transactions(&self) -> Result<Vec<PendingTransaction>> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("get_pending".into());
            Ok(state.pending.clone())
        }

        async fn create_transaction(&self, draft: &TransactionDraft) -> Result<String> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("create".into());
            state.next_id += 1;
            let id = TransactionId::new(format!("tx-{}", state.next_id));
            state.pending.push(record(Some(id), draft));
            Ok("Transaction will be added to Block".into())
        }

        async fn update_transaction(&self, id: &TransactionId, draft: &TransactionDraft) -> Result<String> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("update {}", id));
            match state.pending.iter_mut().find(|t| t.id.as_ref() == Some(id)) {
                Some(existing) => {
                    *existing = record(Some(id.clone()), draft);
                    Ok("Transaction updated".into())
                }
                None => Err(SupplyChainError::Api {
                    status: 404,
                    body: "not found".into(),
                }),
            }
        }

        async fn delete_transaction(&self, id: &TransactionId) -> Result<String> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("delete {}", id));
            state.pending.retain(|t| t.id.as_ref() != Some(id));
            Ok("Transaction deleted".into())
        }

        async fn mine(&self) -> Result<String> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("mine".into());
            let transactions = std::mem::take(&mut state.pending);
            let index = state.chain.len() as u64 + 1;
            state.chain.push(MinedBlock {
                index,
                timestamp: BlockTimestamp::Epoch(1_704_067_200.0),
                previous_hash: "0".repeat(64),
                proof: 100,
                transactions,
            });
            Ok("New Block Forged".into())
        }

        async fn clear(&self) -> Result<String> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("clear".into());
            state.chain.clear();
            state.pending.clear();
            Ok("Blockchain cleared".into())
        }
    }

    fn draft(quantity: &str, temperature: &str, delivery_date: &str) -> TransactionDraft {
        TransactionDraft {
            sender: "Farm Co".into(),
            recipient: "Depot".into(),
            product: "Milk".into(),
            quantity: quantity.into(),
            location: "Leeds".into(),
            status: None,
            temperature: temperature.into(),
            delivery_date: delivery_date.into(),
        }
    }

    fn pending(id: &str, quantity: &str) -> PendingTransaction {
        record(Some(TransactionId::new(id)), &draft(quantity, "3", "2023-12-31"))
    }

    fn session(ledger: FakeLedger) -> OperatorSession<FakeLedger, MemoryStore> {
        let session = OperatorSession::new(ledger, MemoryStore::new());
        session
            .save_conditions(&ConditionsForm::new("10", "5", "2024-01-01"))
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_refused_mine_makes_no_remote_call() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12"), pending("B", "8")]);
        let mut session = session(ledger);

        match session.mine().await.unwrap() {
            MineOutcome::Refused(decision) => {
                assert!(!decision.allowed);
                assert_eq!(decision.offending.len(), 1);
                assert_eq!(decision.offending[0].id, Some(TransactionId::new("B")));
            }
            other => panic!("expected refusal, got {:?}", other),
        }
        assert_eq!(session.api().mine_calls(), 0);
    }

    #[tokio::test]
    async fn test_allowed_mine_refreshes_caches() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12"), pending("B", "40")]);
        let mut session = session(ledger);

        let outcome = session.mine().await.unwrap();
        assert_eq!(
            outcome,
            MineOutcome::Mined {
                message: "New Block Forged".into()
            }
        );
        assert_eq!(session.api().mine_calls(), 1);
        assert!(session.pending().is_empty());
        assert_eq!(session.chain().len(), 1);
        assert_eq!(session.chain()[0].transactions.len(), 2);
    }

    #[tokio::test]
    async fn test_mine_succeeds_when_chain_refresh_fails() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12")]);
        ledger.state.lock().unwrap().chain_unavailable = true;
        let mut session = session(ledger);

        let outcome = session.mine().await.unwrap();
        assert!(matches!(outcome, MineOutcome::Mined { .. }));
        assert_eq!(session.api().mine_calls(), 1);
        assert!(session.chain().is_empty());
        assert!(session.pending().is_empty());
    }

    #[tokio::test]
    async fn test_gate_uses_fresh_snapshot() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12")]);
        let mut session = session(ledger);
        session.refresh_pending().await.unwrap();

        // Another operator adds a failing transaction after our last refresh
        session
            .api()
            .state
            .lock()
            .unwrap()
            .pending
            .push(pending("late", "1"));

        assert!(matches!(session.mine().await.unwrap(), MineOutcome::Refused(_)));
        assert_eq!(session.api().mine_calls(), 0);
    }

    #[tokio::test]
    async fn test_unset_conditions_allow_mining() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "junk")]);
        let mut session = OperatorSession::new(ledger, MemoryStore::new());

        assert!(matches!(session.mine().await.unwrap(), MineOutcome::Mined { .. }));
    }

    #[tokio::test]
    async fn test_create_refreshes_pending() {
        let mut session = session(FakeLedger::default());

        let message = session
            .create_transaction(&draft("12", "3", "2023-12-31"))
            .await
            .unwrap();
        assert_eq!(message, "Transaction will be added to Block");
        assert_eq!(session.pending().len(), 1);
        assert_eq!(session.pending()[0].id, Some(TransactionId::new("tx-1")));
    }

    #[tokio::test]
    async fn test_invalid_draft_never_reaches_ledger() {
        let mut session = session(FakeLedger::default());
        let mut bad = draft("12", "3", "2023-12-31");
        bad.sender.clear();

        let err = session.create_transaction(&bad).await.unwrap_err();
        assert!(err.is_validation());
        assert!(session.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_edit_then_mine() {
        let ledger = FakeLedger::with_pending(vec![pending("B", "8")]);
        let mut session = session(ledger);
        assert!(matches!(session.mine().await.unwrap(), MineOutcome::Refused(_)));

        let id = TransactionId::new("B");
        let mut fixed = session.find_pending(&id).await.unwrap().unwrap().to_draft();
        fixed.quantity = "15".into();
        session.update_transaction(&id, &fixed).await.unwrap();

        assert!(matches!(session.mine().await.unwrap(), MineOutcome::Mined { .. }));
    }

    #[tokio::test]
    async fn test_delete_offender_then_mine() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12"), pending("B", "8")]);
        let mut session = session(ledger);

        session.delete_transaction(&TransactionId::new("B")).await.unwrap();
        assert_eq!(session.pending().len(), 1);
        assert!(matches!(session.mine().await.unwrap(), MineOutcome::Mined { .. }));
    }

    #[tokio::test]
    async fn test_update_unknown_id_surfaces_api_error() {
        let mut session = session(FakeLedger::default());
        let err = session
            .update_transaction(&TransactionId::new("ghost"), &draft("1", "1", "2023-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, SupplyChainError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_pending_with_reports() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12"), pending("B", "8")]);
        let mut session = session(ledger);

        let views = session.pending_with_reports().await.unwrap();
        assert_eq!(views.len(), 2);
        assert!(views[0].report.passes());
        assert!(!views[1].report.passes());
        assert_eq!(views[1].report.failures, vec!["quantity 8 is below the minimum of 10"]);
    }

    #[tokio::test]
    async fn test_clear_refreshes_both_caches() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12")]);
        let mut session = session(ledger);
        session.mine().await.unwrap();
        assert_eq!(session.chain().len(), 1);

        session.clear().await.unwrap();
        assert!(session.chain().is_empty());
        assert!(session.pending().is_empty());
    }

    #[tokio::test]
    async fn test_check_does_not_mine() {
        let ledger = FakeLedger::with_pending(vec![pending("A", "12")]);
        let mut session = session(ledger);

        let decision = session.check().await.unwrap();
        assert!(decision.allowed);
        assert_eq!(session.api().mine_calls(), 0);
    }

    #[test]
    fn test_rejected_conditions_keep_previous() {
        let session = session(FakeLedger::default());
        let before = session.conditions().unwrap();

        assert!(session
            .save_conditions(&ConditionsForm::new("", "", ""))
            .is_err());
        assert_eq!(session.conditions().unwrap(), before);
    }
}
