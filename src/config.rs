//! Engine configuration: a plain struct with a `Default` impl and
//! builder-style setters, mirroring the teacher's `Config` shape. Loading
//! this from a file or environment is an out-of-scope collaborator's job;
//! the core only ever sees the already-constructed struct.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_strategies: usize,
    pub max_position_size: f64,
    pub max_portfolio_risk: f64,
    pub max_correlation: f64,
    pub max_drawdown: f64,
    pub max_daily_loss: f64,
    pub max_concentration: f64,
    pub learning_enabled: bool,
    pub memory_capacity: usize,
    pub buffer_capacity: usize,
    pub initial_cash: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_strategies: 10,
            max_position_size: 0.1,
            max_portfolio_risk: 0.02,
            max_correlation: 0.7,
            max_drawdown: 0.15,
            max_daily_loss: 0.05,
            max_concentration: 0.3,
            learning_enabled: true,
            memory_capacity: 10_000,
            buffer_capacity: 1_000,
            initial_cash: 100_000.0,
        }
    }
}

impl EngineConfig {
    pub fn with_max_strategies(mut self, value: usize) -> Self {
        self.max_strategies = value;
        self
    }

    pub fn with_max_position_size(mut self, value: f64) -> Self {
        self.max_position_size = value;
        self
    }

    pub fn with_max_portfolio_risk(mut self, value: f64) -> Self {
        self.max_portfolio_risk = value;
        self
    }

    pub fn with_max_correlation(mut self, value: f64) -> Self {
        self.max_correlation = value;
        self
    }

    pub fn with_max_drawdown(mut self, value: f64) -> Self {
        self.max_drawdown = value;
        self
    }

    pub fn with_max_daily_loss(mut self, value: f64) -> Self {
        self.max_daily_loss = value;
        self
    }

    pub fn with_max_concentration(mut self, value: f64) -> Self {
        self.max_concentration = value;
        self
    }

    pub fn with_learning_enabled(mut self, value: bool) -> Self {
        self.learning_enabled = value;
        self
    }

    pub fn with_memory_capacity(mut self, value: usize) -> Self {
        self.memory_capacity = value;
        self
    }

    pub fn with_buffer_capacity(mut self, value: usize) -> Self {
        self.buffer_capacity = value;
        self
    }

    pub fn with_initial_cash(mut self, value: f64) -> Self {
        self.initial_cash = value;
        self
    }

    /// Rejects configurations that could never produce a usable engine
    /// (non-positive capacities or cash). Called from `Engine::new`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.buffer_capacity == 0 {
            anyhow::bail!("buffer_capacity must be positive");
        }
        if self.memory_capacity == 0 {
            anyhow::bail!("memory_capacity must be positive");
        }
        if self.initial_cash <= 0.0 {
            anyhow::bail!("initial_cash must be positive");
        }
        if self.max_strategies == 0 {
            anyhow::bail!("max_strategies must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recognized_configuration_options() {
        let config = EngineConfig::default();
        assert_eq!(config.max_strategies, 10);
        assert!((config.max_position_size - 0.1).abs() < 1e-9);
        assert!((config.max_portfolio_risk - 0.02).abs() < 1e-9);
        assert_eq!(config.memory_capacity, 10_000);
        assert_eq!(config.buffer_capacity, 1_000);
        assert!(config.learning_enabled);
    }

    #[test]
    fn builder_chains_overrides() {
        let config = EngineConfig::default()
            .with_max_drawdown(0.2)
            .with_memory_capacity(500);
        assert!((config.max_drawdown - 0.2).abs() < 1e-9);
        assert_eq!(config.memory_capacity, 500);
    }

    #[test]
    fn zero_capacity_fails_validation() {
        let config = EngineConfig::default().with_buffer_capacity(0);
        assert!(config.validate().is_err());
    }
}
