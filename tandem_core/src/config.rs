//! Run configuration: room layout, agent shifts and learning parameters.
//!
//! Every field has a default, so an empty TOML document describes the
//! canonical two-agent run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, scenario::CANONICAL_LAYOUT};

/// Reward constants and the proximity rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Step cost paid by both agents on every ordinary step.
    pub walk: f64,
    /// Reward for both agents when either reaches the goal.
    pub win: f64,
    /// Reward for an agent that dies (hazard or separation).
    pub death: f64,
    /// Reward for both agents when they land on the same cell.
    pub collision: f64,
    /// Largest Euclidean distance the agents may keep between each other.
    pub proximity_threshold: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            walk: -0.1,
            win: 100.0,
            death: -100.0,
            collision: -1.0,
            proximity_threshold: 3.0,
        }
    }
}

/// Which partner positions a value table holds for each own position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartnerCoverage {
    /// Every cell of the room.
    #[default]
    FullGrid,
    /// Cells within `radius` on both axes of the own position.
    Neighborhood { radius: usize },
}

/// Learning parameters and stopping conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Discount factor γ.
    pub gamma: f64,
    /// Exploration rate ε.
    pub epsilon: f64,
    /// Exponent of the learning-rate schedule `tick^-decay`.
    pub alpha_decay: f64,
    /// Value every table entry starts with.
    pub initial_value: f64,
    /// Successful episodes needed to finish a training run.
    pub epochs: u64,
    /// Failed episodes after which a training run gives up.
    pub max_failures: Option<u64>,
    /// Steps after which a training run gives up. Once every fatal action
    /// is pruned from a room with an unreachable goal, nothing else ends it.
    pub max_steps: Option<u64>,
    /// Whether `Stay` is part of every action set.
    pub include_stay: bool,
    pub partner_coverage: PartnerCoverage,
    /// Remove actions that lead to a certain death.
    pub prune_fatal_actions: bool,
    /// Seed for the exploration RNG; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Step budget of a greedy rollout.
    pub rollout_limit: usize,
    /// Failed solve attempts after which both tables are rebuilt.
    pub attempts_before_reset: usize,
    /// Solve attempts before giving up.
    pub max_attempts: usize,
    pub rewards: RewardConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            epsilon: 0.2,
            alpha_decay: 0.1,
            initial_value: 0.0,
            epochs: 200,
            max_failures: Some(100_000),
            max_steps: Some(50_000_000),
            include_stay: true,
            partner_coverage: PartnerCoverage::FullGrid,
            prune_fatal_actions: true,
            seed: None,
            rollout_limit: 100,
            attempts_before_reset: 5,
            max_attempts: 50,
            rewards: RewardConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(invalid("gamma", self.gamma, "a value in (0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(invalid("epsilon", self.epsilon, "a value in [0, 1]"));
        }
        if !(self.alpha_decay > 0.0) {
            return Err(invalid("alpha_decay", self.alpha_decay, "a positive value"));
        }
        if self.epochs == 0 {
            return Err(invalid("epochs", 0.0, "at least one episode"));
        }
        if self.rollout_limit == 0 {
            return Err(invalid("rollout_limit", 0.0, "at least one step"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", 0.0, "at least one attempt"));
        }
        let threshold = self.rewards.proximity_threshold;
        if !(threshold > 0.0) || !threshold.is_finite() {
            return Err(invalid(
                "proximity_threshold",
                threshold,
                "a positive finite distance",
            ));
        }
        if let PartnerCoverage::Neighborhood { radius } = self.partner_coverage {
            let required = self.required_radius();
            if radius < required {
                return Err(ConfigError::NeighborhoodTooSmall { radius, required });
            }
        }
        if !(-0.3..=0.0).contains(&self.rewards.walk) {
            log::warn!(
                "walk reward {} is outside -0.3..0, training may not converge",
                self.rewards.walk
            );
        }
        Ok(())
    }

    /// Smallest neighborhood radius holding every partner position a
    /// non-terminal joint state can have.
    pub fn required_radius(&self) -> usize {
        self.rewards.proximity_threshold.floor() as usize
    }
}

fn invalid(name: &'static str, value: f64, expected: &'static str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        value,
        expected,
    }
}

/// Room layout and agent shifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Layout text, see [`crate::scenario::Scenario::parse`].
    pub layout: String,
    /// Shift of agent one and agent two.
    pub shifts: [usize; 2],
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            layout: CANONICAL_LAYOUT.to_string(),
            shifts: [1, 2],
        }
    }
}

/// Everything a training run reads at setup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub scenario: ScenarioConfig,
    pub training: TrainingConfig,
}

impl RunConfig {
    /// Decodes a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and decodes a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = TrainingConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.gamma, 0.9);
        assert_eq!(cfg.epsilon, 0.2);
        assert_eq!(cfg.rewards.proximity_threshold, 3.0);
        assert_eq!(cfg.required_radius(), 3);
    }

    #[test]
    fn empty_toml_is_the_canonical_run() {
        let cfg = RunConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RunConfig::default());
        assert_eq!(cfg.scenario.shifts, [1, 2]);
    }

    #[test]
    fn toml_overrides_nested_fields() {
        let cfg = RunConfig::from_toml_str(
            r#"
            [scenario]
            layout = "A B . G"
            shifts = [1, 1]

            [training]
            epochs = 10
            seed = 42
            partner_coverage = { kind = "neighborhood", radius = 4 }

            [training.rewards]
            walk = -0.2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scenario.layout, "A B . G");
        assert_eq!(cfg.scenario.shifts, [1, 1]);
        assert_eq!(cfg.training.epochs, 10);
        assert_eq!(cfg.training.seed, Some(42));
        assert_eq!(
            cfg.training.partner_coverage,
            PartnerCoverage::Neighborhood { radius: 4 }
        );
        assert_eq!(cfg.training.rewards.walk, -0.2);
        assert_eq!(cfg.training.rewards.win, 100.0);
        assert_eq!(cfg.training.gamma, 0.9);
    }

    #[test]
    fn malformed_toml_is_a_decode_error() {
        let err = RunConfig::from_toml_str("[training]\nepochs = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_parameters() {
        let mut cfg = TrainingConfig::default();
        cfg.gamma = 1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { name: "gamma", .. })
        ));

        let mut cfg = TrainingConfig::default();
        cfg.epsilon = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { name: "epsilon", .. })
        ));

        let mut cfg = TrainingConfig::default();
        cfg.epochs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainingConfig::default();
        cfg.rewards.proximity_threshold = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_requires_a_wide_enough_neighborhood() {
        let mut cfg = TrainingConfig::default();
        cfg.partner_coverage = PartnerCoverage::Neighborhood { radius: 2 };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NeighborhoodTooSmall {
                radius: 2,
                required: 3
            })
        );
        cfg.partner_coverage = PartnerCoverage::Neighborhood { radius: 3 };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RunConfig::load("/nonexistent/tandem.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
