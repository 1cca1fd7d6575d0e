//! Simulation configuration

use crate::DriverError;
use serde::{Deserialize, Serialize};

/// Parameters of one simulation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Initial number of memory partitions
    pub partitions: usize,
    /// Tick budget
    pub max_ticks: u64,
    /// Installed RAM in GB (reported only, never used for admission)
    pub ram_gb: u32,
}

impl SimulationConfig {
    pub fn new(partitions: usize, max_ticks: u64) -> Self {
        Self {
            partitions,
            max_ticks,
            ..Self::default()
        }
    }

    pub fn with_ram_gb(mut self, ram_gb: u32) -> Self {
        self.ram_gb = ram_gb;
        self
    }

    /// Rejects a zero partition count; a zero tick budget is a valid empty run
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.partitions == 0 {
            return Err(DriverError::InvalidConfig(
                "partitions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            partitions: 1,
            max_ticks: 1,
            ram_gb: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_partitions_rejected() {
        assert!(matches!(
            SimulationConfig::new(0, 10).validate(),
            Err(DriverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_tick_budget_is_valid() {
        assert!(SimulationConfig::new(2, 0).validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{ "partitions": 8 }"#).unwrap();
        assert_eq!(config.partitions, 8);
        assert_eq!(config.max_ticks, 1);
        assert_eq!(config.ram_gb, 1);
    }
}
