use super::traits::NodeProbe;
use async_trait::async_trait;
use chainlb_core::NodeError;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error};
use uuid::Uuid;

/// 单次探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    /// 探测往返耗时，无论成功与否都会记录
    pub latency: Duration,
}

impl HealthStatus {
    pub fn latency_millis(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ms", self.healthy, self.latency_millis())
    }
}

/// 健康检查器
/// 向节点发送一次 `eth_blockNumber` 请求，只要返回2xx即视为健康，忽略响应内容
pub struct HealthChecker {
    client: Client,
}

impl HealthChecker {
    /// 创建新的健康检查器
    pub fn new(timeout: Duration) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self::with_client(client))
    }

    /// 使用已有的HTTP客户端创建健康检查器
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// 构造探测请求体，每次调用生成新的关联ID
    pub fn ping_body() -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": format!("ethBlockNumberPing{}", Uuid::new_v4()),
        })
    }

    async fn check_status(&self, url: &Url) -> bool {
        let body = Self::ping_body();
        debug!("Sending health probe to {}", url);

        match self.client.post(url.clone()).json(&body).send().await {
            Ok(response) => {
                let status = response.status();
                debug!("Health probe to {} answered with status {}", url, status);
                status.is_success()
            }
            Err(e) => {
                error!("Error health check {}: {}", url, e);
                false
            }
        }
    }
}

#[async_trait]
impl NodeProbe for HealthChecker {
    async fn check(&self, url: &Url) -> HealthStatus {
        let start_time = Instant::now();
        let healthy = self.check_status(url).await;

        HealthStatus {
            healthy,
            latency: start_time.elapsed(),
        }
    }
}
