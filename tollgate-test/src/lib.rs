mod fixtures;
mod store;

pub use fixtures::{policy_config, policy_yaml, run_concurrently, sample_store, ProfileBuilder};
pub use store::MemoryStore;
