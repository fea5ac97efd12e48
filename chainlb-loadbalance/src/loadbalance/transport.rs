use super::LoadBalancer;
use chainlb_core::NodeError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// 负载均衡的HTTP传输层
///
/// 每次调用都向负载均衡器要一个当前健康的节点URL，再把请求体POST过去。
pub struct BalancedHttpTransport {
    chain_id: u64,
    balancer: LoadBalancer,
    client: Client,
    headers: HeaderMap,
}

impl BalancedHttpTransport {
    pub fn new(chain_id: u64, balancer: LoadBalancer, client: Client) -> Self {
        Self {
            chain_id,
            balancer,
            client,
            headers: HeaderMap::new(),
        }
    }

    /// 附加每次请求都会携带的请求头，非法的头部会被跳过
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        for (key, value) in headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    self.headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header '{}' for chain {}", key, self.chain_id),
            }
        }
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// 发送一次请求，2xx时返回解析后的响应体
    pub async fn perform(&self, body: &Value) -> Result<Value, NodeError> {
        let url = self.balancer.get_actual_url(self.chain_id).await?;
        debug!("Sending RPC request for chain {} to {}", self.chain_id, url);

        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            let text = response.text().await.unwrap_or_else(|_| "N/A".to_string());
            Err(NodeError::InvalidResponse {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

/// 某条链的JSON-RPC句柄，底层请求都经过负载均衡
pub struct RpcHandle {
    transport: BalancedHttpTransport,
    next_id: AtomicU64,
}

impl RpcHandle {
    pub fn new(transport: BalancedHttpTransport) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.transport.chain_id()
    }

    /// 发送JSON-RPC 2.0请求，返回 `result` 字段
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let mut response = self.transport.perform(&body).await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(NodeError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        Ok(response
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// 当前区块高度
    pub async fn block_number(&self) -> Result<u64, NodeError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&result)
    }

    /// 节点报告的链ID
    pub async fn remote_chain_id(&self) -> Result<u64, NodeError> {
        let result = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&result)
    }

    /// 地址在 `pending` 状态下的交易计数，即下一笔交易的nonce
    pub async fn transaction_count(&self, address: &str) -> Result<u64, NodeError> {
        let result = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity(&result)
    }

    /// 广播已签名的交易，返回交易哈希
    pub async fn send_raw_transaction(&self, signed_tx: &str) -> Result<String, NodeError> {
        let result = self
            .request("eth_sendRawTransaction", json!([signed_tx]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// 解析 `0x` 前缀的十六进制数量
pub fn parse_quantity(value: &Value) -> Result<u64, NodeError> {
    let invalid = || {
        NodeError::Decode(<serde_json::Error as serde::de::Error>::custom(format!(
            "invalid hex quantity: {}",
            value
        )))
    };

    let text = value.as_str().ok_or_else(invalid)?;
    let digits = text.strip_prefix("0x").ok_or_else(invalid)?;
    u64::from_str_radix(digits, 16).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x10")).unwrap(), 16);
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert!(parse_quantity(&json!("10")).is_err());
        assert!(parse_quantity(&json!("0xzz")).is_err());
        assert!(parse_quantity(&json!(16)).is_err());
    }
}
