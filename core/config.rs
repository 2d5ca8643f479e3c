/*!
This module defines the `TrainConfig` struct, which is used to configure a training run with [`train`](../train/fn.train.html). Every field is optional. A config is usually written in YAML:

```yaml
algorithm: random_forest
train_mode: fast
evaluation_strategy: cv
cv_folds: 3
feature_strategy:
  exclude: [customer_id]
explain_options:
  top_k: 10
```
*/

use crate::error::{Error, Result};
use crate::explain::ExplainOptions;
use crate::select::FeatureStrategy;
use crate::target::TrainMode;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
	/// The preset to train. Defaults to `auto`.
	pub algorithm: Option<String>,
	/// Defaults to `balanced`.
	pub train_mode: Option<TrainMode>,
	/// Defaults to `holdout`.
	pub evaluation_strategy: Option<EvaluationStrategy>,
	/// The number of folds when the evaluation strategy is `cv`. Defaults to 5.
	pub cv_folds: Option<usize>,
	/// Whether to compute an explanation summary. Defaults to true.
	pub explain: Option<bool>,
	/// The fraction of rows held out for testing. Defaults to 0.2.
	pub test_fraction: Option<f64>,
	/// Defaults to 42.
	pub random_seed: Option<u64>,
	pub feature_strategy: Option<FeatureStrategy>,
	pub explain_options: Option<ExplainOptions>,
}

/// Whether the reported metrics come from the holdout split alone or are accompanied by k-fold cross validation of the whole pipeline on the training rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStrategy {
	Holdout,
	Cv,
}

impl Default for EvaluationStrategy {
	fn default() -> Self {
		Self::Holdout
	}
}

impl TrainConfig {
	pub fn from_path(path: &Path) -> Result<Self> {
		let yaml = std::fs::read_to_string(path)?;
		Self::from_yaml(&yaml)
	}

	pub fn from_yaml(yaml: &str) -> Result<Self> {
		let config: Self = serde_yaml::from_str(yaml)
			.map_err(|error| Error::InvalidConfig(error.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		let test_fraction = self.test_fraction();
		if !(test_fraction > 0.0 && test_fraction < 1.0) {
			return Err(Error::InvalidConfig(format!(
				"test_fraction must be between 0 and 1, got {}",
				test_fraction
			)));
		}
		if self.cv_folds() < 2 {
			return Err(Error::InvalidConfig(format!(
				"cv_folds must be at least 2, got {}",
				self.cv_folds()
			)));
		}
		Ok(())
	}

	pub fn algorithm(&self) -> &str {
		self.algorithm.as_deref().unwrap_or("auto")
	}

	pub fn train_mode(&self) -> TrainMode {
		self.train_mode.unwrap_or_default()
	}

	pub fn evaluation_strategy(&self) -> EvaluationStrategy {
		self.evaluation_strategy.unwrap_or_default()
	}

	pub fn cv_folds(&self) -> usize {
		self.cv_folds.unwrap_or(5)
	}

	pub fn explain(&self) -> bool {
		self.explain.unwrap_or(true)
	}

	pub fn test_fraction(&self) -> f64 {
		self.test_fraction.unwrap_or(0.2)
	}

	pub fn random_seed(&self) -> u64 {
		self.random_seed.unwrap_or(42)
	}

	pub fn feature_strategy(&self) -> FeatureStrategy {
		self.feature_strategy.clone().unwrap_or_default()
	}

	/// The explain options, seeded with the run's seed unless they set their own.
	pub fn explain_options(&self) -> ExplainOptions {
		match self.explain_options.clone() {
			Some(options) => options,
			None => ExplainOptions {
				seed: self.random_seed(),
				..Default::default()
			},
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = TrainConfig::from_yaml("{}").unwrap();
		assert_eq!(config.algorithm(), "auto");
		assert_eq!(config.train_mode(), TrainMode::Balanced);
		assert_eq!(config.evaluation_strategy(), EvaluationStrategy::Holdout);
		assert_eq!(config.cv_folds(), 5);
		assert!(config.explain());
		assert_eq!(config.test_fraction(), 0.2);
		assert_eq!(config.feature_strategy(), FeatureStrategy::Auto);
		assert_eq!(config.explain_options().seed, 42);
	}

	#[test]
	fn test_yaml() {
		let config = TrainConfig::from_yaml(
			r#"
algorithm: ridge_regression
train_mode: accurate
evaluation_strategy: cv
cv_folds: 3
random_seed: 7
feature_strategy:
  exclude: [id]
explain_options:
  top_k: 5
"#,
		)
		.unwrap();
		assert_eq!(config.algorithm(), "ridge_regression");
		assert_eq!(config.train_mode(), TrainMode::Accurate);
		assert_eq!(config.evaluation_strategy(), EvaluationStrategy::Cv);
		assert_eq!(
			config.feature_strategy(),
			FeatureStrategy::Explicit {
				include: None,
				exclude: Some(vec!["id".to_owned()]),
			}
		);
		let explain_options = config.explain_options();
		assert_eq!(explain_options.top_k, 5);
		assert_eq!(explain_options.n_ref_max, 20);
	}

	#[test]
	fn test_invalid() {
		assert!(matches!(
			TrainConfig::from_yaml("test_fraction: 1.5"),
			Err(Error::InvalidConfig(_))
		));
		assert!(matches!(
			TrainConfig::from_yaml("cv_folds: 1"),
			Err(Error::InvalidConfig(_))
		));
		assert!(matches!(
			TrainConfig::from_yaml("unknown_field: true"),
			Err(Error::InvalidConfig(_))
		));
	}
}
