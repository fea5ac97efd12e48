use alloy::primitives::{Address, U256};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chainlb_contracts::{ContractError, Credentials, DefaultGasProvider, TransactionCall, TransactionManager};
use chainlb_core::Config;
use chainlb_loadbalance::NodeBalanceService;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const PK: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const SENDER: &str = "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23";
const TOKEN: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

type Seen = Arc<Mutex<Vec<Value>>>;

async fn handle_rpc(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().unwrap().push(body.clone());
    let result = match body["method"].as_str() {
        Some("eth_getTransactionCount") => "0x3",
        _ => "0xbeef",
    };
    Json(json!({"jsonrpc": "2.0", "id": body["id"], "result": result}))
}

async fn create_manager() -> (Seen, NodeBalanceService, TransactionManager) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/", post(handle_rpc))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut config = Config::default();
    config
        .nodes
        .url
        .insert("5".to_string(), format!("http://{}/", addr));
    let service = NodeBalanceService::new(&config).unwrap();
    service.actualizer().actualize().await;

    let credentials = Credentials::from_private_key(PK).unwrap();
    let manager = TransactionManager::new(service.rpc(5).unwrap(), credentials, 5);
    (seen, service, manager)
}

fn transfer_call() -> TransactionCall {
    TransactionCall::new(
        TOKEN.parse::<Address>().unwrap(),
        vec![0xa9, 0x05, 0x9c, 0xbb],
        &DefaultGasProvider,
        "transfer",
    )
}

fn requests(seen: &Seen, method: &str) -> Vec<Value> {
    seen.lock()
        .unwrap()
        .iter()
        .filter(|body| body["method"] == method)
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_send_raw_transaction() {
    let (seen, _service, manager) = create_manager().await;

    let hash = manager.send_raw_transaction("0XF86B80").await.unwrap();
    assert_eq!(hash, "0xbeef");

    let sent = requests(&seen, "eth_sendRawTransaction");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["params"], json!(["0xf86b80"]));
}

#[tokio::test]
async fn test_invalid_transaction_is_rejected_locally() {
    let (seen, _service, manager) = create_manager().await;

    let err = manager.send_raw_transaction("0xabc").await.unwrap_err();
    assert!(matches!(err, ContractError::InvalidTransaction(_)));
    assert!(requests(&seen, "eth_sendRawTransaction").is_empty());
}

#[tokio::test]
async fn test_signing_is_deterministic_per_nonce() {
    let (seen, _service, manager) = create_manager().await;
    assert_eq!(manager.address(), SENDER.parse::<Address>().unwrap());

    let call = transfer_call();
    let first = manager.sign(&call, 0).await.unwrap();
    let again = manager.sign(&call, 0).await.unwrap();
    let next = manager.sign(&call, 1).await.unwrap();

    // legacy交易为RLP长列表
    assert_eq!(first[0], 0xf8);
    assert_eq!(first, again);
    assert_ne!(first, next);
    assert_ne!(first, manager.sign(&call.clone().with_value(U256::from(1)), 0).await.unwrap());

    // 签名不访问节点
    assert!(requests(&seen, "eth_getTransactionCount").is_empty());
}

#[tokio::test]
async fn test_send_uses_pending_nonce_of_signer() {
    let (seen, _service, manager) = create_manager().await;
    let call = transfer_call();

    let hash = manager.send(&call).await.unwrap();
    assert_eq!(hash, "0xbeef");

    let counts = requests(&seen, "eth_getTransactionCount");
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0]["params"], json!([SENDER, "pending"]));

    let expected = manager.sign(&call, 3).await.unwrap();
    let sent = requests(&seen, "eth_sendRawTransaction");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["params"], json!([expected.to_string()]));
}
