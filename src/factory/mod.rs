//! Adapter lifecycle management.
//!
//! The factory constructs and initializes channel adapters; the registry
//! actor owns the channel → adapter map.

mod adapter_factory;
mod registry;

pub use adapter_factory::AdapterFactory;
pub use registry::{AdapterEntry, AdapterRegistry, ChannelState};
