use crate::{ContractBinding, ContractError, Credentials, DefaultGasProvider, GasProvider, TransactionManager};
use chainlb_core::scheduler::spawn_periodic;
use chainlb_core::{hex, ContractCacheSettings, ContractId};
use chainlb_loadbalance::EndpointRegistry;
use parking_lot::Mutex;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 缓存键：凭证 + 地址 + 链ID + 绑定类型
#[derive(Clone, PartialEq, Eq, Hash)]
struct ContractKey {
    credentials: Credentials,
    address: String,
    chain_id: u64,
    contract_type: TypeId,
    type_name: &'static str,
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chain_id, self.address, self.type_name)
    }
}

struct CachedContract {
    contract: Arc<dyn Any + Send + Sync>,
    used_at: Instant,
}

/// 合约实例缓存
///
/// 构建合约绑定的代价较高，按 (凭证, 地址, 链, 类型) 缓存实例。
/// 命中时刷新使用时间，超过 `lifetime` 未被使用的实例由后台定时任务清除。
pub struct ContractInstanceCache {
    credentials: Credentials,
    lifetime: Duration,
    gas_provider: Arc<dyn GasProvider>,
    registry: Arc<EndpointRegistry>,
    contracts: Mutex<HashMap<ContractKey, CachedContract>>,
}

impl ContractInstanceCache {
    pub fn new(
        credentials: Credentials,
        lifetime: Duration,
        gas_provider: Arc<dyn GasProvider>,
        registry: Arc<EndpointRegistry>,
    ) -> Self {
        Self {
            credentials,
            lifetime,
            gas_provider,
            registry,
            contracts: Mutex::new(HashMap::new()),
        }
    }

    /// 从配置创建，未配置私钥时随机生成；`disabled` 时返回 `None`
    pub fn from_settings(
        settings: &ContractCacheSettings,
        registry: Arc<EndpointRegistry>,
    ) -> Result<Option<Self>, ContractError> {
        if settings.disabled {
            debug!("Contract cache is disabled");
            return Ok(None);
        }

        let credentials = match &settings.pk {
            Some(pk) => Credentials::from_private_key(pk)?,
            None => Credentials::random(),
        };

        Ok(Some(Self::new(
            credentials,
            settings.lifetime(),
            Arc::new(DefaultGasProvider),
            registry,
        )))
    }

    /// 获取（或创建）指定合约的绑定实例
    pub fn build<T: ContractBinding>(&self, contract_id: &ContractId) -> Result<Arc<T>, ContractError> {
        let address = format!(
            "0x{}",
            hex::prepare_addr(&contract_id.address).map_err(ContractError::InvalidAddress)?
        );
        let key = ContractKey {
            credentials: self.credentials.clone(),
            address,
            chain_id: contract_id.chain_id,
            contract_type: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        };

        if let Some(contract) = self.lookup::<T>(&key) {
            return Ok(contract);
        }

        let contract = Arc::new(self.construct::<T>(&key)?);
        self.contracts.lock().insert(
            key.clone(),
            CachedContract {
                contract: contract.clone(),
                used_at: Instant::now(),
            },
        );
        debug!("Smart contract {} created", key);
        Ok(contract)
    }

    /// 命中时整体替换缓存项以刷新使用时间；类型不符时移除旧实例
    fn lookup<T: ContractBinding>(&self, key: &ContractKey) -> Option<Arc<T>> {
        let mut contracts = self.contracts.lock();
        let cached = contracts.get(key)?.contract.clone();

        match cached.clone().downcast::<T>() {
            Ok(contract) => {
                contracts.insert(
                    key.clone(),
                    CachedContract {
                        contract: cached,
                        used_at: Instant::now(),
                    },
                );
                Some(contract)
            }
            // 键中已包含TypeId，正常情况下不会走到这里
            Err(_) => {
                warn!("Smart contract {} has unexpected type, rebuilding", key);
                contracts.remove(key);
                None
            }
        }
    }

    fn construct<T: ContractBinding>(&self, key: &ContractKey) -> Result<T, ContractError> {
        let rpc = self.registry.get(key.chain_id)?;
        let transaction_manager = Arc::new(TransactionManager::new(
            rpc.clone(),
            key.credentials.clone(),
            key.chain_id,
        ));

        T::load(
            key.address.clone(),
            rpc,
            transaction_manager,
            self.gas_provider.clone(),
        )
        .map_err(ContractError::Construction)
    }

    /// 清除超过生命周期未被使用的实例，返回清除数量
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = Vec::new();

        self.contracts.lock().retain(|key, cached| {
            let alive = now.saturating_duration_since(cached.used_at) <= self.lifetime;
            if !alive {
                removed.push(key.to_string());
            }
            alive
        });

        if !removed.is_empty() {
            warn!("Smart contract for {} removed", removed.join(";"));
        }
        removed.len()
    }

    /// 启动定时清理
    pub fn start_eviction(self: &Arc<Self>, clear_delay: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        spawn_periodic("ClearContracts", clear_delay, clear_delay, move || {
            let cache = cache.clone();
            async move {
                cache.evict_expired();
                Ok(())
            }
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn len(&self) -> usize {
        self.contracts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.lock().is_empty()
    }
}
