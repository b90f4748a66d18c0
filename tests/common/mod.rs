//! Shared builders for integration tests.

use lvflow::config::StudyConfig;
use lvflow::network::Network;

/// Default study config with a fixed seed for reproducible runs.
pub fn seeded_config(seed: u64) -> StudyConfig {
    let mut cfg = StudyConfig::default();
    cfg.study.random_seed = Some(seed);
    cfg
}

/// The five-bus ring study network.
pub fn ring_network() -> Network {
    Network::five_bus_ring()
}
