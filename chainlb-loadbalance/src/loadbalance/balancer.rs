use super::selector::pick_weighted;
use super::{HealthActualizer, NodeStatus};
use chainlb_core::config::model::NodeSettings;
use chainlb_core::NodeError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 选择请求
struct SelectRequest {
    chain_id: u64,
    waited: Duration,
    reply: oneshot::Sender<Result<Url, NodeError>>,
}

/// 节点负载均衡器
///
/// 所有选择请求都交给唯一的后台worker顺序处理，调用方只拿到一个等待结果的future。
/// 某条链暂时没有健康节点时worker会休眠重试，期间其他请求在队列中排队。
#[derive(Clone)]
pub struct LoadBalancer {
    sender: mpsc::UnboundedSender<SelectRequest>,
}

struct BalancerWorker {
    actualizer: Arc<HealthActualizer>,
    timeout: Duration,
    sleep: Duration,
    rng: StdRng,
}

impl LoadBalancer {
    /// 创建负载均衡器并启动后台worker，需要在tokio运行时中调用
    pub fn new(actualizer: Arc<HealthActualizer>, timeout: Duration, sleep: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = BalancerWorker {
            actualizer,
            timeout,
            sleep,
            rng: StdRng::from_os_rng(),
        };

        tokio::spawn(worker.run(receiver));

        Self { sender }
    }

    /// 从节点配置创建
    pub fn from_settings(settings: &NodeSettings, actualizer: Arc<HealthActualizer>) -> Self {
        Self::new(actualizer, settings.balancer_timeout(), settings.balancer_sleep())
    }

    /// 为指定链选择一个健康的节点URL
    pub async fn get_actual_url(&self, chain_id: u64) -> Result<Url, NodeError> {
        self.get_actual_url_with_elapsed(chain_id, Duration::ZERO).await
    }

    /// 为指定链选择节点，`waited` 为已经消耗掉的等待预算
    pub async fn get_actual_url_with_elapsed(
        &self,
        chain_id: u64,
        waited: Duration,
    ) -> Result<Url, NodeError> {
        let started = Instant::now();
        let (reply, receiver) = oneshot::channel();

        self.sender
            .send(SelectRequest {
                chain_id,
                waited,
                reply,
            })
            .map_err(|_| NodeError::BalancerStopped)?;

        let result = receiver.await.map_err(|_| NodeError::BalancerStopped)?;
        debug!(
            "Load balancer answered for chain {} in {}ms",
            chain_id,
            started.elapsed().as_millis()
        );
        result
    }
}

impl BalancerWorker {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<SelectRequest>) {
        while let Some(request) = receiver.recv().await {
            let result = self.select(request.chain_id, request.waited).await;
            if request.reply.send(result).is_err() {
                debug!("Caller for chain {} is gone, dropping selection", request.chain_id);
            }
        }
        debug!("Load balancer worker stopped");
    }

    async fn select(&mut self, chain_id: u64, already_waited: Duration) -> Result<Url, NodeError> {
        let started = Instant::now();
        let mut waited = already_waited;

        loop {
            let candidates: Vec<NodeStatus> = self
                .actualizer
                .healthy(chain_id)
                .iter()
                .filter(|status| status.healthy)
                .cloned()
                .collect();

            if let Some(picked) = pick_weighted(&candidates, &mut self.rng) {
                return Ok(picked.url.clone());
            }

            if waited.saturating_add(self.sleep) < self.timeout {
                info!("No valid url for chain {}. Waiting for it", chain_id);
                tokio::time::sleep(self.sleep).await;
                waited = already_waited.saturating_add(started.elapsed());
            } else {
                warn!(
                    "No valid url for chain {} after {}ms, giving up",
                    chain_id,
                    waited.as_millis()
                );
                return Err(NodeError::NoEndpointAvailable { chain_id, waited });
            }
        }
    }
}
