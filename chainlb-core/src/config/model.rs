use crate::hex;
use crate::logging::LogLevel;
use anyhow::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub nodes: NodeSettings,
    #[serde(default)]
    pub contracts: ContractCacheSettings,
    #[serde(default)]
    pub synchronisation: SynchronisationSettings,
}

/// 区块链节点配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeSettings {
    /// 链ID -> 逗号分隔的URL列表
    #[serde(default)]
    pub url: BTreeMap<String, String>,
    #[serde(default)]
    pub disabled: bool,
    /// 负载均衡器等待可用节点的总超时
    #[serde(default = "default_balancer_timeout")]
    pub balancer_timeout_ms: u64,
    /// 无可用节点时两次重试之间的固定休眠
    #[serde(default = "default_balancer_sleep")]
    pub balancer_sleep_ms: u64,
    #[serde(default = "default_node_timeout")]
    pub node_timeout_seconds: u64,
    /// 每次RPC调用附带的额外请求头
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub health: HealthSettings,
}

/// 节点健康检查配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthSettings {
    #[serde(default = "default_health_logging_level")]
    pub logging_level: LogLevel,
    /// 单轮健康检查的最长等待时间
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_ms: u64,
    #[serde(default = "default_check_delay")]
    pub check_delay_seconds: u64,
    #[serde(default = "default_first_delay")]
    pub first_delay_ms: u64,
    /// 健康检查并发数
    #[serde(default = "default_threads")]
    pub threads: usize,
}

/// 合约实例缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContractCacheSettings {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_contract_lifetime")]
    pub lifetime_seconds: u64,
    #[serde(default = "default_contract_clear_delay")]
    pub clear_delay_ms: u64,
    /// 签名私钥，未配置时随机生成
    #[serde(default)]
    pub pk: Option<String>,
}

/// 锁注册表配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SynchronisationSettings {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_seconds: u64,
    #[serde(default = "default_lock_clear_delay")]
    pub clear_delay_seconds: u64,
}

/// 单个节点端点，启动时由配置生成，之后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub chain_id: u64,
    pub url: Url,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            url: BTreeMap::new(),
            disabled: false,
            balancer_timeout_ms: default_balancer_timeout(),
            balancer_sleep_ms: default_balancer_sleep(),
            node_timeout_seconds: default_node_timeout(),
            headers: BTreeMap::new(),
            health: HealthSettings::default(),
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            logging_level: default_health_logging_level(),
            refresh_timeout_ms: default_refresh_timeout(),
            check_delay_seconds: default_check_delay(),
            first_delay_ms: default_first_delay(),
            threads: default_threads(),
        }
    }
}

impl Default for ContractCacheSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            lifetime_seconds: default_contract_lifetime(),
            clear_delay_ms: default_contract_clear_delay(),
            pk: None,
        }
    }
}

impl Default for SynchronisationSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            lock_timeout_seconds: default_lock_timeout(),
            clear_delay_seconds: default_lock_clear_delay(),
        }
    }
}

// Default value functions
fn default_balancer_timeout() -> u64 {
    10_000
}

fn default_balancer_sleep() -> u64 {
    3_000
}

fn default_node_timeout() -> u64 {
    15
}

fn default_health_logging_level() -> LogLevel {
    LogLevel::Trace
}

fn default_refresh_timeout() -> u64 {
    10_000
}

fn default_check_delay() -> u64 {
    60
}

fn default_first_delay() -> u64 {
    1_000
}

fn default_threads() -> usize {
    20
}

fn default_contract_lifetime() -> u64 {
    600 // 10分钟
}

fn default_contract_clear_delay() -> u64 {
    2_000
}

fn default_lock_timeout() -> u64 {
    600
}

fn default_lock_clear_delay() -> u64 {
    60
}

impl NodeSettings {
    /// 将配置中的URL列表展开为端点列表（按链ID排序）
    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut endpoints = Vec::new();

        for (chain_key, urls) in &self.url {
            let chain_id = parse_chain_id(chain_key)?;

            for raw in urls.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let url = Url::parse(raw).map_err(|e| {
                    anyhow::anyhow!("Chain '{}' has invalid url '{}': {}", chain_key, raw, e)
                })?;
                endpoints.push(Endpoint { chain_id, url });
            }
        }

        endpoints.sort_by_key(|e| e.chain_id);
        Ok(endpoints)
    }

    /// 已配置的链ID
    pub fn chain_ids(&self) -> Result<Vec<u64>> {
        self.url.keys().map(|k| parse_chain_id(k)).collect()
    }

    pub fn balancer_timeout(&self) -> Duration {
        Duration::from_millis(self.balancer_timeout_ms)
    }

    pub fn balancer_sleep(&self) -> Duration {
        Duration::from_millis(self.balancer_sleep_ms)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_seconds)
    }
}

impl HealthSettings {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn check_delay(&self) -> Duration {
        Duration::from_secs(self.check_delay_seconds)
    }

    pub fn first_delay(&self) -> Duration {
        Duration::from_millis(self.first_delay_ms)
    }
}

impl ContractCacheSettings {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_seconds)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }
}

impl SynchronisationSettings {
    pub fn lock_lifetime(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_seconds)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_secs(self.clear_delay_seconds)
    }
}

/// 所有时间类配置的上限（一年），超出后 `Instant` 运算会溢出
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn check_period(name: &str, period: Duration) -> Result<()> {
    if period > MAX_PERIOD {
        anyhow::bail!(
            "{} is too large: {}s, must not exceed {}s",
            name,
            period.as_secs(),
            MAX_PERIOD.as_secs()
        );
    }
    Ok(())
}

fn parse_chain_id(key: &str) -> Result<u64> {
    key.trim()
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("Invalid chain id '{}': must be an unsigned integer", key))
}

impl Config {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if !self.nodes.disabled {
            self.validate_node_config(&self.nodes)?;
        }

        if !self.contracts.disabled {
            self.validate_contract_config(&self.contracts)?;
        }

        if !self.synchronisation.disabled {
            self.validate_synchronisation_config(&self.synchronisation)?;
        }

        Ok(())
    }

    /// 验证节点配置
    fn validate_node_config(&self, nodes: &NodeSettings) -> Result<()> {
        for (chain_key, urls) in &nodes.url {
            parse_chain_id(chain_key)?;

            if urls.split(',').all(|s| s.trim().is_empty()) {
                anyhow::bail!("Chain '{}' has empty url list", chain_key);
            }
        }

        for endpoint in nodes.endpoints()? {
            // URL格式验证
            if endpoint.url.scheme() != "http" && endpoint.url.scheme() != "https" {
                anyhow::bail!(
                    "Chain '{}' has invalid url format: '{}'. Must start with http:// or https://",
                    endpoint.chain_id,
                    endpoint.url
                );
            }
        }

        if nodes.balancer_sleep_ms == 0 {
            anyhow::bail!("nodes.balancer_sleep_ms cannot be 0");
        }

        if nodes.node_timeout_seconds == 0 {
            anyhow::bail!("nodes.node_timeout_seconds cannot be 0");
        }

        if nodes.health.threads == 0 {
            anyhow::bail!("nodes.health.threads cannot be 0");
        }

        if nodes.health.check_delay_seconds == 0 {
            anyhow::bail!("nodes.health.check_delay_seconds cannot be 0");
        }

        if nodes.health.refresh_timeout_ms == 0 {
            anyhow::bail!("nodes.health.refresh_timeout_ms cannot be 0");
        }

        check_period("nodes.balancer_timeout_ms", nodes.balancer_timeout())?;
        check_period("nodes.balancer_sleep_ms", nodes.balancer_sleep())?;
        check_period("nodes.node_timeout_seconds", nodes.node_timeout())?;
        check_period("nodes.health.refresh_timeout_ms", nodes.health.refresh_timeout())?;
        check_period("nodes.health.check_delay_seconds", nodes.health.check_delay())?;
        check_period("nodes.health.first_delay_ms", nodes.health.first_delay())?;

        for (header_name, header_value) in &nodes.headers {
            if header_name.is_empty() {
                anyhow::bail!("nodes.headers has empty header name");
            }
            if header_value.is_empty() {
                anyhow::bail!("nodes.headers has empty value for header '{}'", header_name);
            }
        }

        Ok(())
    }

    /// 验证合约缓存配置
    fn validate_contract_config(&self, contracts: &ContractCacheSettings) -> Result<()> {
        if contracts.clear_delay_ms == 0 {
            anyhow::bail!("contracts.clear_delay_ms cannot be 0");
        }

        check_period("contracts.lifetime_seconds", contracts.lifetime())?;
        check_period("contracts.clear_delay_ms", contracts.clear_delay())?;

        if let Some(pk) = &contracts.pk {
            let prepared = hex::prepare_hex(pk)
                .map_err(|_| anyhow::anyhow!("contracts.pk is not a valid hex string"))?;
            if prepared.len() != 64 {
                anyhow::bail!(
                    "contracts.pk must be 32 bytes (64 hex characters), got {}",
                    prepared.len()
                );
            }
        }

        Ok(())
    }

    /// 验证锁注册表配置
    fn validate_synchronisation_config(&self, sync: &SynchronisationSettings) -> Result<()> {
        if sync.clear_delay_seconds == 0 {
            anyhow::bail!("synchronisation.clear_delay_seconds cannot be 0");
        }

        if sync.lock_timeout_seconds == 0 {
            anyhow::bail!("synchronisation.lock_timeout_seconds cannot be 0");
        }

        check_period("synchronisation.lock_timeout_seconds", sync.lock_lifetime())?;
        check_period("synchronisation.clear_delay_seconds", sync.clear_delay())?;

        Ok(())
    }
}
