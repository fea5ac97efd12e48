use crate::{ContractError, Credentials, GasProvider};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::eth::TransactionRequest;
use chainlb_core::hex;
use chainlb_loadbalance::RpcHandle;
use std::sync::Arc;
use tracing::debug;

/// 待签名的合约调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_price: u128,
    pub gas_limit: u64,
}

impl TransactionCall {
    /// 使用 `gas_provider` 给出的 `function` 对应gas参数
    pub fn new(to: Address, data: impl Into<Bytes>, gas_provider: &dyn GasProvider, function: &str) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
            gas_price: gas_provider.gas_price(function),
            gas_limit: gas_provider.gas_limit(function),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// 绑定到某条链的交易管理器，用凭证签名交易并通过负载均衡的RPC句柄广播
pub struct TransactionManager {
    rpc: Arc<RpcHandle>,
    credentials: Credentials,
    chain_id: u64,
}

impl TransactionManager {
    pub fn new(rpc: Arc<RpcHandle>, credentials: Credentials, chain_id: u64) -> Self {
        Self {
            rpc,
            credentials,
            chain_id,
        }
    }

    pub fn rpc(&self) -> &Arc<RpcHandle> {
        &self.rpc
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// 发送方地址
    pub fn address(&self) -> Address {
        self.credentials.address()
    }

    /// 以给定nonce签名为带链ID的legacy交易，返回EIP-2718编码
    pub async fn sign(&self, call: &TransactionCall, nonce: u64) -> Result<Bytes, ContractError> {
        let wallet = EthereumWallet::from(self.credentials.signer().clone());
        let mut request = TransactionRequest::default()
            .with_to(call.to)
            .with_input(call.data.clone())
            .with_value(call.value)
            .with_chain_id(self.chain_id)
            .with_nonce(nonce)
            .with_gas_price(call.gas_price)
            .with_gas_limit(call.gas_limit);
        request.from = Some(self.address());

        let signed = request
            .build(&wallet)
            .await
            .map_err(|e| ContractError::Signing(e.to_string()))?;
        Ok(Bytes::from(signed.encoded_2718()))
    }

    /// 查询pending nonce，签名并广播，返回交易哈希
    pub async fn send(&self, call: &TransactionCall) -> Result<String, ContractError> {
        let nonce = self
            .rpc
            .transaction_count(&format!("{:#x}", self.address()))
            .await?;
        debug!(
            "Signing transaction to {:#x} on chain {} with nonce {}",
            call.to, self.chain_id, nonce
        );

        let signed = self.sign(call, nonce).await?;
        self.send_raw_transaction(&signed.to_string()).await
    }

    /// 广播已签名的交易，返回交易哈希
    pub async fn send_raw_transaction(&self, signed_tx: &str) -> Result<String, ContractError> {
        let prepared = hex::prepare_hex(signed_tx).map_err(ContractError::InvalidTransaction)?;
        debug!(
            "Sending raw transaction to chain {} ({} bytes)",
            self.chain_id,
            prepared.len() / 2
        );

        let hash = self
            .rpc
            .send_raw_transaction(&format!("0x{}", prepared))
            .await?;
        debug!("Transaction {} accepted by chain {}", hash, self.chain_id);
        Ok(hash)
    }
}
