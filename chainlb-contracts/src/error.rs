use chainlb_core::{HexError, NodeError};
use thiserror::Error;

/// 合约构建与交易发送的错误类型
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Invalid contract address: {0}")]
    InvalidAddress(HexError),
    #[error("Invalid signed transaction: {0}")]
    InvalidTransaction(HexError),
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Failed to sign transaction: {0}")]
    Signing(String),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error("Failed to construct contract binding: {0:#}")]
    Construction(anyhow::Error),
}
