use crate::{GasProvider, TransactionManager};
use chainlb_loadbalance::RpcHandle;
use std::sync::Arc;

/// 合约绑定的构造方式
///
/// 缓存未命中时以 `(地址, RPC句柄, 交易管理器, gas参数)` 调用 `load` 创建实例，
/// 地址为带 `0x` 前缀的小写形式。
pub trait ContractBinding: Sized + Send + Sync + 'static {
    fn load(
        address: String,
        rpc: Arc<RpcHandle>,
        transaction_manager: Arc<TransactionManager>,
        gas_provider: Arc<dyn GasProvider>,
    ) -> anyhow::Result<Self>;
}
