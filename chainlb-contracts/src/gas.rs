/// 合约调用的gas参数
pub trait GasProvider: Send + Sync {
    /// gas价格（wei）
    fn gas_price(&self, function: &str) -> u128;
    fn gas_limit(&self, function: &str) -> u64;
}

/// 固定gas参数：4.1 gwei，9,000,000 gas
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGasProvider;

impl DefaultGasProvider {
    pub const GAS_PRICE: u128 = 4_100_000_000;
    pub const GAS_LIMIT: u64 = 9_000_000;
}

impl GasProvider for DefaultGasProvider {
    fn gas_price(&self, _function: &str) -> u128 {
        Self::GAS_PRICE
    }

    fn gas_limit(&self, _function: &str) -> u64 {
        Self::GAS_LIMIT
    }
}
