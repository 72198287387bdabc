pub mod manager;
pub mod policy;
pub mod pool;
pub mod usage;

pub use manager::{KeyBroker, KeyBrokerBuilder, ProviderStatus};
pub use policy::RateLimitPolicy;
pub use pool::{KeyLease, KeyPool, KeyStatus};
pub use usage::KeyUsage;
