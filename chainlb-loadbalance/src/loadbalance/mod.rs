pub mod actualizer;
pub mod balancer;
pub mod health_checker;
pub mod registry;
pub mod selector;
pub mod service;
pub mod traits;
pub mod transport;

pub use actualizer::{HealthActualizer, NodeStatus};
pub use balancer::LoadBalancer;
pub use health_checker::{HealthChecker, HealthStatus};
pub use registry::EndpointRegistry;
pub use service::NodeBalanceService;
pub use traits::NodeProbe;
pub use transport::{BalancedHttpTransport, RpcHandle};

#[cfg(test)]
pub(crate) mod test_support;
