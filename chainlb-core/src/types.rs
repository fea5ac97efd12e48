use serde::{Deserialize, Serialize};
use std::fmt;

/// 合约标识：地址 + 链ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ContractId {
    pub address: String,
    #[serde(rename = "chainId", alias = "chain_id")]
    pub chain_id: u64,
}

impl ContractId {
    pub fn new(address: impl Into<String>, chain_id: u64) -> Self {
        Self {
            address: address.into(),
            chain_id,
        }
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.address)
    }
}
