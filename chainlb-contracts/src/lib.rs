//! Chainlb Contracts Library
//!
//! Memoized smart contract bindings bound to load-balanced RPC handles:
//! - Signing credentials and the raw transaction manager
//! - Gas price / limit providers
//! - The contract instance cache with lifetime based eviction

pub mod binding;
pub mod cache;
pub mod credentials;
pub mod error;
pub mod gas;
pub mod transaction;

// Re-export commonly used types
pub use binding::ContractBinding;
pub use cache::ContractInstanceCache;
pub use credentials::Credentials;
pub use error::ContractError;
pub use gas::{DefaultGasProvider, GasProvider};
pub use transaction::{TransactionCall, TransactionManager};
