//! 测试用的辅助类型

use super::traits::NodeProbe;
use super::HealthStatus;
use async_trait::async_trait;
use chainlb_core::config::model::Endpoint;
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Copy)]
struct Behaviour {
    healthy: bool,
    latency: Duration,
    panics: bool,
}

/// 探测结束（包括panic与中止）时减少计数
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 按URL返回预设结果的探测器，未设置的URL视为不健康
#[derive(Default)]
pub(crate) struct ScriptedProbe {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl ScriptedProbe {
    pub(crate) fn set(&self, url: &str, healthy: bool, latency_ms: u64) {
        self.behaviours.lock().insert(
            url.to_string(),
            Behaviour {
                healthy,
                latency: Duration::from_millis(latency_ms),
                panics: false,
            },
        );
    }

    /// 等待 `latency_ms` 后panic
    pub(crate) fn set_panicking(&self, url: &str, latency_ms: u64) {
        self.behaviours.lock().insert(
            url.to_string(),
            Behaviour {
                healthy: true,
                latency: Duration::from_millis(latency_ms),
                panics: true,
            },
        );
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeProbe for ScriptedProbe {
    async fn check(&self, url: &Url) -> HealthStatus {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let behaviour = self.behaviours.lock().get(url.as_str()).copied();
        let behaviour = behaviour.unwrap_or(Behaviour {
            healthy: false,
            latency: Duration::ZERO,
            panics: false,
        });
        tokio::time::sleep(behaviour.latency).await;

        if behaviour.panics {
            panic!("scripted failure for {}", url);
        }
        HealthStatus {
            healthy: behaviour.healthy,
            latency: behaviour.latency,
        }
    }
}

pub(crate) fn endpoint(chain_id: u64, url: &str) -> Endpoint {
    Endpoint {
        chain_id,
        url: Url::parse(url).unwrap(),
    }
}
