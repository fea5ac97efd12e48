use async_trait::async_trait;
use reqwest::Url;

use super::HealthStatus;

/// 单节点存活探测接口
///
/// 健康状态刷新器只依赖这个trait，便于注入不同的探测实现和单元测试
#[async_trait]
pub trait NodeProbe: Send + Sync {
    /// 对单个端点执行一次探测，不做重试
    async fn check(&self, url: &Url) -> HealthStatus;
}
