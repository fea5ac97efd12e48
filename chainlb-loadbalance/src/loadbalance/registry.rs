use super::{BalancedHttpTransport, LoadBalancer, RpcHandle};
use chainlb_core::config::model::NodeSettings;
use chainlb_core::NodeError;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 链ID到RPC句柄的静态映射，构造后不再变化
pub struct EndpointRegistry {
    handles: HashMap<u64, Arc<RpcHandle>>,
}

impl EndpointRegistry {
    pub fn new(handles: HashMap<u64, Arc<RpcHandle>>) -> Self {
        Self { handles }
    }

    /// 为每条配置的链创建一个经过负载均衡的RPC句柄
    pub fn from_settings(
        settings: &NodeSettings,
        balancer: &LoadBalancer,
        client: &Client,
    ) -> anyhow::Result<Self> {
        let handles = settings
            .chain_ids()?
            .into_iter()
            .map(|chain_id| {
                let transport = BalancedHttpTransport::new(chain_id, balancer.clone(), client.clone())
                    .with_headers(&settings.headers);
                debug!("Registered RPC handle for chain {}", chain_id);
                (chain_id, Arc::new(RpcHandle::new(transport)))
            })
            .collect();

        Ok(Self::new(handles))
    }

    /// 获取指定链的RPC句柄，未配置的链立即返回错误
    pub fn get(&self, chain_id: u64) -> Result<Arc<RpcHandle>, NodeError> {
        self.handles
            .get(&chain_id)
            .cloned()
            .ok_or(NodeError::NetworkNotConfigured(chain_id))
    }

    /// 已配置的链ID，升序
    pub fn networks(&self) -> Vec<u64> {
        let mut networks: Vec<u64> = self.handles.keys().copied().collect();
        networks.sort_unstable();
        networks
    }
}
