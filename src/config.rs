// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::error::fail_with;
use crate::fsrs::DEFAULT_WEIGHTS;
use crate::fsrs::Days;
use crate::fsrs::Rating;
use crate::fsrs::WEIGHT_COUNT;
use crate::fsrs::Weights;

/// Minutes in a day, for converting learning steps.
const MINUTES_PER_DAY: f64 = 1440.0;

/// The fixed inputs to the scheduler. These are supplied from outside and
/// never fitted here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingParameters {
    /// Identifies the weight set. Logged when the server starts.
    pub version: String,
    pub w: Weights,
    /// Target retrievability at the moment a card falls due.
    pub request_retention: f64,
    /// Hard cap on review intervals, in days.
    pub maximum_interval: u32,
    /// Learning steps, in minutes.
    pub learning_steps: Vec<f64>,
    /// Relearning steps, in minutes.
    pub relearning_steps: Vec<f64>,
    pub forgiveness: ForgivenessPolicy,
}

impl Default for SchedulingParameters {
    fn default() -> Self {
        Self {
            version: "fsrs-4".to_string(),
            w: DEFAULT_WEIGHTS,
            request_retention: 0.9,
            maximum_interval: 36500,
            learning_steps: vec![1.0, 10.0],
            relearning_steps: vec![10.0],
            forgiveness: ForgivenessPolicy::default(),
        }
    }
}

/// How overdue review cards are treated when the learner has forgiveness
/// mode on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgivenessPolicy {
    /// A card this many days past due qualifies.
    pub threshold_days: f64,
    pub good_bonus: f64,
    pub easy_bonus: f64,
}

impl Default for ForgivenessPolicy {
    fn default() -> Self {
        Self {
            threshold_days: 7.0,
            good_bonus: 1.2,
            easy_bonus: 1.5,
        }
    }
}

impl ForgivenessPolicy {
    pub fn bonus(&self, rating: Rating) -> f64 {
        match rating {
            Rating::Good => self.good_bonus,
            Rating::Easy => self.easy_bonus,
            Rating::Again | Rating::Hard => 1.0,
        }
    }
}

/// Which list of short steps to use.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Steps {
    Learning,
    Relearning,
}

impl SchedulingParameters {
    /// The delay, in days, of the step at `index`. Lists shorter than the
    /// index fall back to their last step.
    pub fn step_days(&self, steps: Steps, index: usize) -> Days {
        let list = match steps {
            Steps::Learning => &self.learning_steps,
            Steps::Relearning => &self.relearning_steps,
        };
        let minutes = list.get(index).or(list.last()).copied().unwrap_or(0.0);
        minutes / MINUTES_PER_DAY
    }

    pub fn validate(&self) -> Fallible<()> {
        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return invalid(format!(
                "request_retention must be in (0, 1), got {}",
                self.request_retention
            ));
        }
        if self.maximum_interval < 1 {
            return invalid("maximum_interval must be at least 1 day");
        }
        if let Some(i) = (0..WEIGHT_COUNT).find(|&i| !self.w[i].is_finite()) {
            return invalid(format!("w[{i}] must be finite"));
        }
        if let Some(i) = (0..4).find(|&i| self.w[i] <= 0.0) {
            return invalid(format!("w[{i}] must be positive"));
        }
        for (name, steps) in [
            ("learning_steps", &self.learning_steps),
            ("relearning_steps", &self.relearning_steps),
        ] {
            if steps.is_empty() {
                return invalid(format!("{name} must not be empty"));
            }
            if steps.iter().any(|m| !m.is_finite() || *m <= 0.0) {
                return invalid(format!("{name} must be positive and finite"));
            }
        }
        let forgiveness = &self.forgiveness;
        if !forgiveness.threshold_days.is_finite() || forgiveness.threshold_days < 0.0 {
            return invalid("forgiveness.threshold_days must be finite and not negative");
        }
        for (name, bonus) in [
            ("good_bonus", forgiveness.good_bonus),
            ("easy_bonus", forgiveness.easy_bonus),
        ] {
            if !bonus.is_finite() || bonus <= 0.0 {
                return invalid(format!("forgiveness.{name} must be positive and finite"));
            }
        }
        Ok(())
    }
}

fn invalid<T>(message: impl Into<String>) -> Fallible<T> {
    fail_with(ErrorKind::InvalidConfig, message)
}

/// The on-disk configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scheduling: SchedulingParameters,
}

impl Config {
    /// Load the configuration at `path`, or the defaults if there is none.
    pub fn load(path: Option<&Path>) -> Fallible<Self> {
        let config = match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                let content = read_to_string(path)?;
                Self::parse(&content)?
            }
            None => Self::default(),
        };
        config.scheduling.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Fallible<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults_are_valid() -> Fallible<()> {
        SchedulingParameters::default().validate()
    }

    #[test]
    fn test_step_days() {
        let params = SchedulingParameters::default();
        assert_eq!(params.step_days(Steps::Learning, 0), 1.0 / 1440.0);
        assert_eq!(params.step_days(Steps::Learning, 1), 10.0 / 1440.0);
        // Only one relearning step: the second falls back to it.
        assert_eq!(params.step_days(Steps::Relearning, 1), 10.0 / 1440.0);
    }

    #[test]
    fn test_parse_partial_file() -> Fallible<()> {
        let config = Config::parse(
            r#"
            [scheduling]
            request_retention = 0.85
            learning_steps = [5.0]

            [scheduling.forgiveness]
            threshold_days = 14.0
            "#,
        )?;
        assert_eq!(config.scheduling.request_retention, 0.85);
        assert_eq!(config.scheduling.learning_steps, vec![5.0]);
        assert_eq!(config.scheduling.maximum_interval, 36500);
        assert_eq!(config.scheduling.forgiveness.threshold_days, 14.0);
        assert_eq!(config.scheduling.forgiveness.easy_bonus, 1.5);
        Ok(())
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = Config::parse("[scheduling]\nretention = 0.9\n");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_validation() {
        let params = SchedulingParameters {
            request_retention: 1.0,
            ..Default::default()
        };
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::InvalidConfig);

        let params = SchedulingParameters {
            relearning_steps: vec![],
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let mut params = SchedulingParameters::default();
        params.w[2] = 0.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_non_finite_values_are_rejected() -> Fallible<()> {
        let mut params = SchedulingParameters::default();
        params.w[14] = f64::NAN;
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::InvalidConfig);

        let mut params = SchedulingParameters::default();
        params.w[0] = f64::INFINITY;
        assert!(params.validate().is_err());

        let mut params = SchedulingParameters::default();
        params.forgiveness.easy_bonus = f64::NAN;
        assert!(params.validate().is_err());

        let config = Config::parse("[scheduling]\nlearning_steps = [1.0, inf]\n")?;
        assert!(config.scheduling.validate().is_err());
        let config = Config::parse("[scheduling]\nrelearning_steps = [nan]\n")?;
        assert!(config.scheduling.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> Fallible<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "[scheduling]\nmaximum_interval = 365")?;
        let config = Config::load(Some(file.path()))?;
        assert_eq!(config.scheduling.maximum_interval, 365);
        Ok(())
    }

    #[test]
    fn test_load_rejects_invalid_values() -> Fallible<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "[scheduling]\nmaximum_interval = 0")?;
        let result = Config::load(Some(file.path()));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidConfig);
        Ok(())
    }
}
