//! Chainlb Load Balance Library
//!
//! This library provides node load balancing for chainlb including:
//! - Single-endpoint liveness probing
//! - Periodic health actualization per logical network
//! - Latency-weighted endpoint selection
//! - Load-balanced JSON-RPC handles and the per-network registry

pub mod loadbalance;

// Re-export commonly used types
pub use loadbalance::{
    EndpointRegistry, HealthActualizer, HealthChecker, HealthStatus, LoadBalancer,
    NodeBalanceService, NodeProbe, NodeStatus, RpcHandle,
};
