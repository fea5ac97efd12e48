use std::time::Duration;
use thiserror::Error;

/// 节点访问相关的错误类型
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Can't get actual url for chain {chain_id}. Timeout after {}ms", waited.as_millis())]
    NoEndpointAvailable { chain_id: u64, waited: Duration },
    #[error("Network {0} is not configured")]
    NetworkNotConfigured(u64),
    #[error("Load balancer worker is not running")]
    BalancerStopped,
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid response received: {status}; {body}")]
    InvalidResponse { status: u16, body: String },
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Failed to decode RPC response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// 十六进制字符串校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("{0} is invalid wallet address!")]
    InvalidAddress(String),
    #[error("{0} is invalid hex string!")]
    InvalidHex(String),
}
