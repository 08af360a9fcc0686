//! ============================================================================
//! Ledger Client - Remote supply chain API
//! ============================================================================
//! Thin typed calls against the ledger service:
//! - GET    {base}/chain                  mined blocks
//! - GET    {base}/pending-transactions   transactions awaiting mining
//! - POST   {base}/transactions/new       create
//! - PUT    {base}/transactions/{id}      update
//! - DELETE {base}/transactions/{id}      delete
//! - GET    {base}/mine                   mine pending transactions
//! - POST   {base}/clear                  clear the chain
//!
//! Responses are parsed into typed records here. A pending list with any
//! malformed record is rejected whole.
//! ============================================================================

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Result, SupplyChainError};
use crate::types::{MinedBlock, PendingTransaction, TransactionDraft, TransactionId};

/// Operations offered by the ledger service
#[async_trait]
pub trait SupplyChainApi: Send + Sync {
    async fn get_chain(&self) -> Result<Vec<MinedBlock>>;
    async fn get_pending_transactions(&self) -> Result<Vec<PendingTransaction>>;
    async fn create_transaction(&self, draft: &TransactionDraft) -> Result<String>;
    async fn update_transaction(&self, id: &TransactionId, draft: &TransactionDraft) -> Result<String>;
    async fn delete_transaction(&self, id: &TransactionId) -> Result<String>;
    async fn mine(&self) -> Result<String>;
    async fn clear(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ChainResponse {
    chain: Vec<MinedBlock>,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    transactions: Vec<PendingTransaction>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: Option<String>,
}

/// HTTP implementation of [`SupplyChainApi`]
pub struct HttpSupplyChainClient {
    client: Client,
    base_url: String,
}

impl HttpSupplyChainClient {
    /// Create a client for the configured server
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(concat!("supplychain-client/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SupplyChainError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base(),
        })
    }

    /// Base URL requests are sent under
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `{base}/transactions/{id}` with the id percent-encoded as one segment
    fn transaction_url(&self, id: &TransactionId) -> Result<Url> {
        let mut url = Url::parse(&self.url("transactions"))
            .map_err(|e| SupplyChainError::Config(format!("Invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SupplyChainError::Config("API base URL cannot carry a path".into()))?
            .push(id.as_str());
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| SupplyChainError::Network(format!("Failed to {}: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupplyChainError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
        let body = response
            .text()
            .await
            .map_err(|e| SupplyChainError::Network(format!("Failed to read {} response: {}", action, e)))?;
        serde_json::from_str(&body).map_err(|e| {
            SupplyChainError::MalformedResponse(format!("Failed to parse {} response: {}", action, e))
        })
    }

    /// The `message` field of the response, or `fallback` when there is none
    async fn read_message(response: Response, fallback: &str) -> String {
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<MessageResponse>(&body)
            .ok()
            .and_then(|r| r.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[async_trait]
impl SupplyChainApi for HttpSupplyChainClient {
    async fn get_chain(&self) -> Result<Vec<MinedBlock>> {
        let response = self
            .send(self.client.get(self.url("chain")), "fetch chain")
            .await?;
        let chain: ChainResponse = Self::read_json(response, "chain").await?;

        debug!("Fetched {} blocks", chain.chain.len());
        Ok(chain.chain)
    }

    async fn get_pending_transactions(&self) -> Result<Vec<PendingTransaction>> {
        let response = self
            .send(
                self.client.get(self.url("pending-transactions")),
                "fetch pending transactions",
            )
            .await?;
        let pending: PendingResponse = Self::read_json(response, "pending transactions").await?;

        debug!("Fetched {} pending transactions", pending.transactions.len());
        Ok(pending.transactions)
    }

    async fn create_transaction(&self, draft: &TransactionDraft) -> Result<String> {
        info!(
            "Creating transaction: {} -> {} ({})",
            draft.sender, draft.recipient, draft.product
        );

        let response = self
            .send(
                self.client.post(self.url("transactions/new")).json(draft),
                "create transaction",
            )
            .await?;
        Ok(Self::read_message(response, "Transaction created").await)
    }

    async fn update_transaction(&self, id: &TransactionId, draft: &TransactionDraft) -> Result<String> {
        info!("Updating transaction {}", id);

        let url = self.transaction_url(id)?;
        let response = self
            .send(self.client.put(url).json(draft), "update transaction")
            .await?;
        Ok(Self::read_message(response, "Transaction updated successfully.").await)
    }

    async fn delete_transaction(&self, id: &TransactionId) -> Result<String> {
        info!("Deleting transaction {}", id);

        let url = self.transaction_url(id)?;
        let response = self
            .send(self.client.delete(url), "delete transaction")
            .await?;
        Ok(Self::read_message(response, "Transaction deleted successfully.").await)
    }

    async fn mine(&self) -> Result<String> {
        info!("Requesting a new block");

        let response = self
            .send(self.client.get(self.url("mine")), "mine block")
            .await?;
        Ok(Self::read_message(response, "New block mined").await)
    }

    async fn clear(&self) -> Result<String> {
        info!("Requesting chain clear");

        let response = self
            .send(self.client.post(self.url("clear")), "clear chain")
            .await?;
        Ok(Self::read_message(response, "Blockchain cleared").await)
    }
}
