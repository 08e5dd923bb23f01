use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable thresholds of the load balancer and the simulation cycle.
///
/// Every field has a default, so a JSON file only needs to name the values it overrides.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Utilization at or above which a node (or edge) is considered overloaded.
    pub overload_threshold: f64,
    /// Utilization at or above which an overload is reported with severity 0.
    pub critical_threshold: f64,
    /// Fraction of a receiving node's spare capacity that a single transfer may use.
    pub transfer_ratio: f64,
    /// Multiplier applied by `overload` events that do not carry one.
    pub default_overload_multiplier: f64,
    /// The aggregate node failure event becomes severity 0 when more nodes than this are down.
    pub failure_alarm_count: usize,
    /// Order of the consumption history B+Tree.
    pub history_order: usize,
    /// Maximum number of balancer messages copied into a cycle's logs.
    pub max_detail_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overload_threshold: 0.9,
            critical_threshold: 0.95,
            transfer_ratio: 0.5,
            default_overload_multiplier: 1.5,
            failure_alarm_count: 3,
            history_order: 4,
            max_detail_messages: 3,
        }
    }
}

impl Config {
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Config> {
        let content = std::fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}
