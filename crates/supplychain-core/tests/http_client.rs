use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use supplychain_core::{
    ClientConfig, HttpSupplyChainClient, MemoryStore, MineOutcome, OperatorSession,
    SupplyChainApi, SupplyChainError, TransactionDraft, TransactionId, TransactionStatus,
};

#[derive(Default)]
struct Ledger {
    pending: Vec<Value>,
    chain: Vec<Value>,
    next_id: u32,
    requests: Vec<String>,
}

type Shared = Arc<Mutex<Ledger>>;

async fn chain(State(state): State<Shared>) -> Json<Value> {
    let mut ledger = state.lock().unwrap();
    ledger.requests.push("GET /chain".into());
    Json(json!({ "chain": ledger.chain, "length": ledger.chain.len() }))
}

async fn pending(State(state): State<Shared>) -> Json<Value> {
    let mut ledger = state.lock().unwrap();
    ledger.requests.push("GET /pending-transactions".into());
    Json(json!({ "transactions": ledger.pending }))
}

async fn create(State(state): State<Shared>, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut ledger = state.lock().unwrap();
    ledger.requests.push("POST /transactions/new".into());
    ledger.next_id += 1;
    body["_id"] = json!(format!("tx-{}", ledger.next_id));
    ledger.pending.push(body);
    let index = ledger.chain.len() + 1;
    (
        StatusCode::CREATED,
        Json(json!({ "message": format!("Transaction will be added to Block {}", index) })),
    )
}

async fn update(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut ledger = state.lock().unwrap();
    ledger.requests.push(format!("PUT /transactions/{}", id));
    match ledger.pending.iter_mut().find(|t| t["_id"] == json!(id)) {
        Some(existing) => {
            body["_id"] = json!(id);
            *existing = body;
            Ok(Json(json!({ "message": "Transaction updated" })))
        }
        None => Err((StatusCode::NOT_FOUND, "Transaction not found".into())),
    }
}

async fn remove(State(state): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut ledger = state.lock().unwrap();
    ledger.requests.push(format!("DELETE /transactions/{}", id));
    ledger.pending.retain(|t| t["_id"] != json!(id));
    StatusCode::NO_CONTENT
}

async fn mine(State(state): State<Shared>) -> Json<Value> {
    let mut ledger = state.lock().unwrap();
    ledger.requests.push("GET /mine".into());
    let transactions = std::mem::take(&mut ledger.pending);
    let index = ledger.chain.len() + 1;
    ledger.chain.push(json!({
        "index": index,
        "timestamp": 1_704_067_200.25,
        "previous_hash": "00af",
        "proof": 533,
        "transactions": transactions,
    }));
    Json(json!({ "message": "New Block Forged", "index": index }))
}

async fn clear(State(state): State<Shared>) -> Json<Value> {
    let mut ledger = state.lock().unwrap();
    ledger.requests.push("POST /clear".into());
    ledger.chain.clear();
    ledger.pending.clear();
    Json(json!({ "message": "Blockchain cleared" }))
}

async fn spawn_router(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_ledger(state: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/api/chain", get(chain))
        .route("/api/pending-transactions", get(pending))
        .route("/api/transactions/new", post(create))
        .route("/api/transactions/:id", put(update).delete(remove))
        .route("/api/mine", get(mine))
        .route("/api/clear", post(clear))
        .with_state(state);
    spawn_router(app).await
}

fn client_for(addr: SocketAddr) -> HttpSupplyChainClient {
    HttpSupplyChainClient::new(&ClientConfig {
        server_url: format!("http://{}", addr),
        timeout_secs: 5,
        ..ClientConfig::default()
    })
    .unwrap()
}

fn draft(quantity: &str) -> TransactionDraft {
    TransactionDraft {
        sender: "Farm Co".into(),
        recipient: "Depot 4".into(),
        product: "Milk".into(),
        quantity: quantity.into(),
        location: "Leeds".into(),
        status: Some(TransactionStatus::Pending),
        temperature: "3".into(),
        delivery_date: "2023-12-31".into(),
    }
}

#[tokio::test]
async fn test_crud_round_trip_over_http() {
    let state = Shared::default();
    let client = client_for(spawn_ledger(state.clone()).await);

    let message = client.create_transaction(&draft("12")).await.unwrap();
    assert_eq!(message, "Transaction will be added to Block 1");

    let pending = client.get_pending_transactions().await.unwrap();
    assert_eq!(pending.len(), 1);
    let id = pending[0].id.clone().unwrap();
    assert_eq!(id, TransactionId::new("tx-1"));
    assert_eq!(pending[0].status, Some(TransactionStatus::Pending));
    assert_eq!(pending[0].delivery_date, "2023-12-31");

    let mut edited = pending[0].to_draft();
    edited.quantity = "30".into();
    client.update_transaction(&id, &edited).await.unwrap();
    assert_eq!(client.get_pending_transactions().await.unwrap()[0].quantity, "30");

    let message = client.delete_transaction(&id).await.unwrap();
    assert_eq!(message, "Transaction deleted successfully.");
    assert!(client.get_pending_transactions().await.unwrap().is_empty());

    let requests = state.lock().unwrap().requests.clone();
    assert!(requests.contains(&"PUT /transactions/tx-1".to_string()));
    assert!(requests.contains(&"DELETE /transactions/tx-1".to_string()));
}

#[tokio::test]
async fn test_mine_and_chain_over_http() {
    let state = Shared::default();
    let client = client_for(spawn_ledger(state.clone()).await);

    client.create_transaction(&draft("12")).await.unwrap();
    assert_eq!(client.mine().await.unwrap(), "New Block Forged");

    let chain = client.get_chain().await.unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].index, 1);
    assert_eq!(chain[0].proof, 533);
    assert_eq!(chain[0].transactions[0].product, "Milk");
    assert_eq!(chain[0].timestamp.to_string(), "2024-01-01 00:00:00 UTC");

    assert_eq!(client.clear().await.unwrap(), "Blockchain cleared");
    assert!(client.get_chain().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_error_status_becomes_api_error() {
    let client = client_for(spawn_ledger(Shared::default()).await);

    let err = client
        .update_transaction(&TransactionId::new("missing"), &draft("1"))
        .await
        .unwrap_err();
    match err {
        SupplyChainError::Api { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Transaction not found");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_pending_list_rejected_whole() {
    let app = Router::new().route(
        "/api/pending-transactions",
        get(|| async {
            Json(json!({
                "transactions": [
                    { "_id": "ok", "sender": "a", "recipient": "b", "product": "c", "status": "Pending" },
                    { "_id": "bad", "sender": "a", "recipient": "b", "product": "c", "status": "Teleported" }
                ]
            }))
        }),
    );
    let client = client_for(spawn_router(app).await);

    let err = client.get_pending_transactions().await.unwrap_err();
    assert!(matches!(err, SupplyChainError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr).get_chain().await.unwrap_err();
    assert!(matches!(err, SupplyChainError::Network(_)));
}

#[tokio::test]
async fn test_session_gate_over_http() {
    let state = Shared::default();
    let client = client_for(spawn_ledger(state.clone()).await);
    let mut session = OperatorSession::new(client, MemoryStore::new());
    session
        .save_conditions(&supplychain_core::ConditionsForm::new("10", "5", "2024-01-01"))
        .unwrap();

    session.create_transaction(&draft("12")).await.unwrap();
    session.create_transaction(&draft("8")).await.unwrap();

    let decision = match session.mine().await.unwrap() {
        MineOutcome::Refused(decision) => decision,
        other => panic!("expected refusal, got {:?}", other),
    };
    assert_eq!(decision.offending.len(), 1);
    assert_eq!(decision.offending[0].quantity, "8");
    assert!(!state.lock().unwrap().requests.contains(&"GET /mine".to_string()));

    let offender = decision.offending[0].id.clone().unwrap();
    session.delete_transaction(&offender).await.unwrap();

    assert!(matches!(session.mine().await.unwrap(), MineOutcome::Mined { .. }));
    assert_eq!(session.chain().len(), 1);
    assert!(session.pending().is_empty());
}
