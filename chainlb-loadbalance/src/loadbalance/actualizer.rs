use super::traits::NodeProbe;
use super::HealthStatus;
use chainlb_core::config::model::{Endpoint, NodeSettings};
use chainlb_core::scheduler::spawn_periodic;
use chainlb_core::LogLevel;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

/// 某个端点在一轮检查中的健康状态
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatus {
    pub chain_id: u64,
    pub url: Url,
    pub healthy: bool,
    pub latency_millis: u64,
    pub checked_at: DateTime<Utc>,
}

/// 节点健康状态刷新器
///
/// 定期并发探测所有配置的端点，并按链ID发布本轮健康的端点列表。
/// 每轮结果整体替换上一轮的列表，失败或超时的端点直接从列表中消失。
pub struct HealthActualizer {
    endpoints: Vec<Endpoint>,
    chain_ids: Vec<u64>,
    probe: Arc<dyn NodeProbe>,
    workers: Arc<Semaphore>,
    refresh_timeout: Duration,
    log_level: LogLevel,
    statuses: RwLock<HashMap<u64, Arc<Vec<NodeStatus>>>>,
}

impl HealthActualizer {
    /// 创建新的健康状态刷新器
    pub fn new(
        endpoints: Vec<Endpoint>,
        probe: Arc<dyn NodeProbe>,
        threads: usize,
        refresh_timeout: Duration,
        log_level: LogLevel,
    ) -> Self {
        let mut chain_ids: Vec<u64> = endpoints.iter().map(|e| e.chain_id).collect();
        chain_ids.sort_unstable();
        chain_ids.dedup();

        Self {
            endpoints,
            chain_ids,
            probe,
            workers: Arc::new(Semaphore::new(threads.max(1))),
            refresh_timeout,
            log_level,
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// 从节点配置创建
    pub fn from_settings(settings: &NodeSettings, probe: Arc<dyn NodeProbe>) -> anyhow::Result<Self> {
        Ok(Self::new(
            settings.endpoints()?,
            probe,
            settings.health.threads,
            settings.health.refresh_timeout(),
            settings.health.logging_level,
        ))
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn chain_ids(&self) -> &[u64] {
        &self.chain_ids
    }

    /// 获取指定链当前健康的端点列表，未知链返回空列表
    pub fn healthy(&self, chain_id: u64) -> Arc<Vec<NodeStatus>> {
        self.statuses
            .read()
            .get(&chain_id)
            .cloned()
            .unwrap_or_default()
    }

    /// 获取所有链的当前快照
    pub fn snapshot(&self) -> HashMap<u64, Arc<Vec<NodeStatus>>> {
        self.statuses.read().clone()
    }

    /// 执行一轮健康检查，返回本轮健康的端点数量
    ///
    /// 所有探测任务共享同一个从派发时刻起算的截止时间，
    /// 超时的任务会被中止并按失败处理，其迟到的结果不会再影响状态。
    pub async fn actualize(&self) -> usize {
        let deadline = Instant::now() + self.refresh_timeout;
        debug!("Starting health actualization for {} endpoints", self.endpoints.len());

        let tasks: Vec<_> = self
            .endpoints
            .iter()
            .cloned()
            .map(|endpoint| {
                let probe = self.probe.clone();
                let workers = self.workers.clone();
                let url = endpoint.url.clone();

                let handle = tokio::spawn(async move {
                    let _permit = workers.acquire_owned().await.ok()?;
                    Some(probe.check(&url).await)
                });

                (endpoint, handle)
            })
            .collect();

        let refresh_timeout = self.refresh_timeout;
        let log_level = self.log_level;
        let results = join_all(tasks.into_iter().map(|(endpoint, handle)| async move {
            let abort = handle.abort_handle();
            match timeout_at(deadline, handle).await {
                Ok(Ok(Some(status))) => {
                    log_level.log(format_args!("Health {}:{}", endpoint.url, status));
                    Some((endpoint, status))
                }
                Ok(Ok(None)) => {
                    error!("Error actualize health {}: worker pool closed", endpoint.url);
                    None
                }
                Ok(Err(e)) if e.is_panic() => {
                    error!("Health check for {} panicked", endpoint.url);
                    None
                }
                Ok(Err(e)) => {
                    error!("Error actualize health {}: {}", endpoint.url, e);
                    None
                }
                Err(_) => {
                    abort.abort();
                    warn!(
                        "Health check for {} timed out after {}ms",
                        endpoint.url,
                        refresh_timeout.as_millis()
                    );
                    None
                }
            }
        }))
        .await;

        let checked_at = Utc::now();
        let healthy: Vec<NodeStatus> = results
            .into_iter()
            .flatten()
            .filter(|(_, status)| status.healthy)
            .map(|(endpoint, status)| Self::to_node_status(endpoint, status, checked_at))
            .collect();

        let healthy_count = healthy.len();
        self.publish(healthy);

        debug!(
            "Completed health actualization: {}/{} endpoints healthy",
            healthy_count,
            self.endpoints.len()
        );
        healthy_count
    }

    fn to_node_status(endpoint: Endpoint, status: HealthStatus, checked_at: DateTime<Utc>) -> NodeStatus {
        NodeStatus {
            chain_id: endpoint.chain_id,
            url: endpoint.url,
            healthy: status.healthy,
            latency_millis: status.latency_millis(),
            checked_at,
        }
    }

    /// 按链分组并整体替换每条链的列表（包括本轮全部失败的链）
    fn publish(&self, healthy: Vec<NodeStatus>) {
        let mut grouped: HashMap<u64, Vec<NodeStatus>> =
            self.chain_ids.iter().map(|id| (*id, Vec::new())).collect();

        for status in healthy {
            grouped.entry(status.chain_id).or_default().push(status);
        }

        let mut statuses = self.statuses.write();
        for (chain_id, list) in grouped {
            statuses.insert(chain_id, Arc::new(list));
        }
    }

    /// 启动定时刷新
    pub fn start(self: &Arc<Self>, first_delay: Duration, period: Duration) -> JoinHandle<()> {
        let actualizer = self.clone();
        spawn_periodic("CheckNodes", first_delay, period, move || {
            let actualizer = actualizer.clone();
            async move {
                actualizer.actualize().await;
                Ok(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadbalance::test_support::{endpoint, ScriptedProbe};
    use std::sync::atomic::Ordering;

    fn create_actualizer(probe: Arc<ScriptedProbe>, threads: usize, timeout_ms: u64) -> HealthActualizer {
        let endpoints = vec![
            endpoint(1, "http://a.test/"),
            endpoint(1, "http://b.test/"),
            endpoint(137, "http://c.test/"),
        ];
        HealthActualizer::new(
            endpoints,
            probe,
            threads,
            Duration::from_millis(timeout_ms),
            LogLevel::Debug,
        )
    }

    fn urls(list: &[NodeStatus]) -> Vec<&str> {
        list.iter().map(|s| s.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_actualize_groups_healthy_by_chain() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("http://a.test/", true, 5);
        probe.set("http://b.test/", false, 5);
        probe.set("http://c.test/", true, 20);

        let actualizer = create_actualizer(probe, 4, 1000);
        let healthy = actualizer.actualize().await;

        assert_eq!(healthy, 2);
        assert_eq!(urls(&actualizer.healthy(1)), vec!["http://a.test/"]);
        assert_eq!(urls(&actualizer.healthy(137)), vec!["http://c.test/"]);

        let c = &actualizer.healthy(137)[0];
        assert!(c.healthy);
        assert_eq!(c.chain_id, 137);
        assert!(c.latency_millis >= 20);
    }

    #[tokio::test]
    async fn test_unknown_chain_is_empty() {
        let probe = Arc::new(ScriptedProbe::default());
        let actualizer = create_actualizer(probe, 4, 1000);

        assert!(actualizer.healthy(1).is_empty());
        assert!(actualizer.healthy(42).is_empty());
    }

    #[tokio::test]
    async fn test_failed_endpoint_does_not_leak_into_next_cycle() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("http://a.test/", true, 1);
        probe.set("http://b.test/", true, 1);
        probe.set("http://c.test/", true, 1);

        let actualizer = create_actualizer(probe.clone(), 4, 1000);
        actualizer.actualize().await;
        assert_eq!(actualizer.healthy(1).len(), 2);
        assert_eq!(actualizer.healthy(137).len(), 1);

        // 第二轮：链1部分失败，链137全部失败
        probe.set("http://b.test/", false, 1);
        probe.set("http://c.test/", false, 1);
        actualizer.actualize().await;

        assert_eq!(urls(&actualizer.healthy(1)), vec!["http://a.test/"]);
        assert!(actualizer.healthy(137).is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_probe_is_treated_as_failed() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("http://a.test/", true, 500);
        probe.set("http://b.test/", true, 5);
        probe.set("http://c.test/", true, 5);

        let actualizer = create_actualizer(probe, 4, 100);
        let started = std::time::Instant::now();
        actualizer.actualize().await;
        let elapsed = started.elapsed();

        // 慢节点不会消耗后续节点的时间预算
        assert_eq!(urls(&actualizer.healthy(1)), vec!["http://b.test/"]);
        assert_eq!(actualizer.healthy(137).len(), 1);
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("http://a.test/", true, 30);
        probe.set("http://b.test/", true, 30);
        probe.set("http://c.test/", true, 30);

        let actualizer = create_actualizer(probe.clone(), 1, 2000);
        let healthy = actualizer.actualize().await;

        assert_eq!(healthy, 3);
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_check_is_treated_as_failed() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set_panicking("http://a.test/", 5);
        probe.set("http://b.test/", true, 5);
        probe.set("http://c.test/", true, 5);

        let actualizer = create_actualizer(probe.clone(), 4, 1000);
        assert_eq!(actualizer.actualize().await, 2);

        let snapshot = actualizer.snapshot();
        assert_eq!(urls(&snapshot[&1]), vec!["http://b.test/"]);
        assert_eq!(urls(&snapshot[&137]), vec!["http://c.test/"]);
        assert_eq!(probe.in_flight(), 0);

        // panic不影响下一轮
        probe.set("http://a.test/", true, 5);
        assert_eq!(actualizer.actualize().await, 3);
        assert_eq!(actualizer.healthy(1).len(), 2);
    }

    #[tokio::test]
    async fn test_aborted_check_releases_in_flight() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("http://a.test/", true, 500);

        let actualizer = create_actualizer(probe.clone(), 4, 50);
        actualizer.actualize().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(probe.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_start_publishes_periodically() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("http://a.test/", true, 1);

        let actualizer = Arc::new(create_actualizer(probe.clone(), 4, 1000));
        let handle = actualizer.start(Duration::from_millis(10), Duration::from_millis(30));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(urls(&actualizer.healthy(1)), vec!["http://a.test/"]);

        probe.set("http://a.test/", false, 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(actualizer.healthy(1).is_empty());

        handle.abort();
    }
}
