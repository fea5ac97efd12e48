use super::{EndpointRegistry, HealthActualizer, HealthChecker, LoadBalancer, RpcHandle};
use anyhow::Result;
use chainlb_core::config::model::NodeSettings;
use chainlb_core::{Config, NodeError};
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// 节点负载均衡服务
/// 整合健康检查、健康状态刷新、负载均衡器与RPC句柄注册表，提供统一的服务接口
pub struct NodeBalanceService {
    settings: NodeSettings,
    actualizer: Arc<HealthActualizer>,
    balancer: LoadBalancer,
    registry: Arc<EndpointRegistry>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl NodeBalanceService {
    /// 根据配置创建服务，需要在tokio运行时中调用
    pub fn new(config: &Config) -> Result<Self> {
        // 验证配置
        config.validate()?;

        let settings = config.nodes.clone();
        let client = Client::builder()
            .timeout(settings.node_timeout())
            .connect_timeout(settings.node_timeout())
            .build()?;

        let checker = Arc::new(HealthChecker::with_client(client.clone()));
        let actualizer = Arc::new(HealthActualizer::from_settings(&settings, checker)?);
        let balancer = LoadBalancer::from_settings(&settings, actualizer.clone());
        let registry = Arc::new(EndpointRegistry::from_settings(&settings, &balancer, &client)?);

        info!(
            "Node balance service created for {} networks, {} endpoints",
            actualizer.chain_ids().len(),
            actualizer.endpoints().len()
        );

        Ok(Self {
            settings,
            actualizer,
            balancer,
            registry,
            timer: Mutex::new(None),
        })
    }

    /// 启动健康状态定时刷新，重复调用无副作用
    pub fn start(&self) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        if self.settings.disabled {
            info!("Node balancing is disabled, health actualization not started");
            return;
        }

        let health = &self.settings.health;
        *timer = Some(self.actualizer.start(health.first_delay(), health.check_delay()));
        info!(
            "Node balance service started: first check in {}ms, then every {}s",
            health.first_delay_ms, health.check_delay_seconds
        );
    }

    /// 停止定时刷新，已发布的健康列表保持不变
    pub fn stop(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
            info!("Node balance service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }

    pub fn actualizer(&self) -> &Arc<HealthActualizer> {
        &self.actualizer
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// 获取指定链的RPC句柄
    pub fn rpc(&self, chain_id: u64) -> Result<Arc<RpcHandle>, NodeError> {
        self.registry.get(chain_id)
    }
}

impl Drop for NodeBalanceService {
    fn drop(&mut self) {
        self.stop();
    }
}
