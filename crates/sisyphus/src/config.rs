//! Declarative retry configuration
//!
//! Serde-friendly knobs for the stop and wait strategies, so retry behavior
//! can live in a configuration file instead of code. Field defaults match
//! the executor defaults: unbounded attempts, no wait between attempts.
//!
//! ```yaml
//! max-attempts: 5
//! backoff: exponential
//! backoff-base: 2.0
//! initial-delay-ms: 50
//! max-delay-ms: 1000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategies::{
    ExponentialBackoff, FixedDelay, NeverStop, NoDelay, StopAfter, StopStrategy, WaitStrategy,
};

/// Errors raised while assembling retry configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// A field value that cannot describe a usable strategy
    #[error("invalid retry configuration: {message}")]
    Invalid {
        /// What is wrong with the configuration
        message: String,
    },
}

/// Declarative retry policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Maximum number of attempts; absent means unbounded
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Wait behavior between attempts
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Base for exponential backoff
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Ceiling on any single inter-attempt delay, in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: BackoffKind::default(),
            backoff_base: default_backoff_base(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_backoff_base() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    100
}
fn default_max_delay() -> u64 {
    1000
}

/// Wait behavior between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    /// No pause between attempts (default)
    #[default]
    None,

    /// Constant pause of `initial-delay-ms`
    Fixed,

    /// Exponentially growing pause, capped at `max-delay-ms`
    Exponential,
}

impl RetryConfig {
    /// Parse a configuration from YAML and validate it
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject field values that cannot describe a usable strategy.
    ///
    /// Configuration errors surface here, when the policy set is assembled,
    /// rather than in the middle of an execution.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                message: "max-attempts must allow at least one attempt".to_string(),
            });
        }
        if self.backoff == BackoffKind::Exponential {
            if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "backoff-base must be a finite value >= 1.0, got {}",
                        self.backoff_base
                    ),
                });
            }
            if self.max_delay_ms == 0 {
                return Err(ConfigError::Invalid {
                    message: "max-delay-ms must be positive for exponential backoff".to_string(),
                });
            }
        }
        Ok(())
    }

    /// The stop strategy described by this configuration
    pub fn stop_strategy(&self) -> Box<dyn StopStrategy> {
        match self.max_attempts {
            Some(max) => Box::new(StopAfter::new(max)),
            None => Box::new(NeverStop),
        }
    }

    /// The wait strategy described by this configuration
    pub fn wait_strategy(&self) -> Box<dyn WaitStrategy> {
        match self.backoff {
            BackoffKind::None => Box::new(NoDelay),
            BackoffKind::Fixed => Box::new(FixedDelay::new(Duration::from_millis(
                self.initial_delay_ms,
            ))),
            BackoffKind::Exponential => Box::new(
                ExponentialBackoff::new(
                    Duration::from_millis(self.initial_delay_ms),
                    self.backoff_base,
                )
                .with_max_delay(Duration::from_millis(self.max_delay_ms)),
            ),
        }
    }
}
