/*!
This module chooses which columns of a dataframe are used as features, drops the rows whose target is missing, and partitions the chosen columns by semantic type for the presets.
*/

use crate::error::{Error, Result};
use crate::profile::{DatasetProfile, SemanticType};
use kitsune_dataframe::{DataFrame, DataFrameColumn, DataFrameView};
use std::collections::BTreeSet;

/// How feature columns are chosen. `Auto` uses every column except those the profile suggests excluding. `Explicit` lists columns to include, to exclude, or both, and falls back to the profile's exclusions when `exclude` is absent. An empty `include` list means every column, and an empty `exclude` list means the profile's exclusions, the same as leaving them out.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "FeatureStrategyRepr", into = "FeatureStrategyRepr")]
pub enum FeatureStrategy {
	Auto,
	Explicit {
		include: Option<Vec<String>>,
		exclude: Option<Vec<String>>,
	},
}

impl Default for FeatureStrategy {
	fn default() -> Self {
		Self::Auto
	}
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum FeatureStrategyRepr {
	Keyword(StrategyKeyword),
	Explicit {
		#[serde(default)]
		include: Option<Vec<String>>,
		#[serde(default)]
		exclude: Option<Vec<String>>,
	},
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum StrategyKeyword {
	Auto,
}

impl From<FeatureStrategyRepr> for FeatureStrategy {
	fn from(value: FeatureStrategyRepr) -> Self {
		match value {
			FeatureStrategyRepr::Keyword(StrategyKeyword::Auto) => Self::Auto,
			FeatureStrategyRepr::Explicit { include, exclude } => Self::Explicit { include, exclude },
		}
	}
}

impl From<FeatureStrategy> for FeatureStrategyRepr {
	fn from(value: FeatureStrategy) -> Self {
		match value {
			FeatureStrategy::Auto => Self::Keyword(StrategyKeyword::Auto),
			FeatureStrategy::Explicit { include, exclude } => Self::Explicit { include, exclude },
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SemanticTypePartition {
	pub categorical: Vec<String>,
	pub numeric: Vec<String>,
	pub boolean: Vec<String>,
}

impl SemanticTypePartition {
	pub fn n_columns(&self) -> usize {
		self.categorical.len() + self.numeric.len() + self.boolean.len()
	}
}

/// The feature columns and the target column, restricted to the rows where the target is present.
#[derive(Debug, Clone)]
pub struct Selection {
	pub features: DataFrame,
	pub target: DataFrameColumn,
}

pub fn select(
	dataframe: &DataFrameView,
	target: &str,
	profile: Option<&DatasetProfile>,
	strategy: &FeatureStrategy,
) -> Result<Selection> {
	let profile_exclusions = || -> Result<BTreeSet<String>> {
		let profile = profile.ok_or(Error::ProfileMissing)?;
		Ok(profile.exclude_suggestions.iter().cloned().collect())
	};
	let (include, mut exclude): (Option<BTreeSet<String>>, BTreeSet<String>) = match strategy {
		FeatureStrategy::Auto => (None, profile_exclusions()?),
		FeatureStrategy::Explicit { include, exclude } => {
			if include.as_ref().map(|include| include.is_empty()).unwrap_or(false) {
				log::debug!("the include list is empty, every column is included");
			}
			let include = include
				.as_ref()
				.filter(|include| !include.is_empty())
				.map(|include| include.iter().cloned().collect());
			let exclude = match exclude.as_ref().filter(|exclude| !exclude.is_empty()) {
				Some(exclude) => {
					if exclude.iter().any(|name| name == target) {
						return Err(Error::TargetExcluded(target.to_owned()));
					}
					exclude.iter().cloned().collect()
				}
				None => profile_exclusions()?,
			};
			(include, exclude)
		}
	};
	// The profile may flag the target itself, for example a constant or id-like column. The target is never excluded.
	exclude.remove(target);
	let column_names: Vec<String> = dataframe
		.column_names()
		.into_iter()
		.filter(|name| {
			include
				.as_ref()
				.map(|include| include.contains(name))
				.unwrap_or(true)
				&& !exclude.contains(name)
		})
		.collect();
	if !column_names.iter().any(|name| name == target) {
		return Err(Error::TargetNotFound(target.to_owned()));
	}
	let target_column = dataframe
		.column(target)
		.ok_or_else(|| Error::TargetNotFound(target.to_owned()))?;
	let rows: Vec<usize> = (0..target_column.len())
		.filter(|index| match target_column.value_to_string(*index) {
			Some(value) => !value.is_empty(),
			None => false,
		})
		.collect();
	if rows.is_empty() {
		return Err(Error::EmptyTarget(target.to_owned()));
	}
	let n_dropped = target_column.len() - rows.len();
	if n_dropped > 0 {
		log::warn!("dropped {} rows with a missing target", n_dropped);
	}
	let feature_names: Vec<&String> = column_names.iter().filter(|name| *name != target).collect();
	let features = dataframe
		.select(&feature_names)
		.ok_or_else(|| Error::SchemaMismatch("a selected column disappeared".to_owned()))?
		.take_rows(&rows);
	let target = target_column.take_rows(&rows);
	log::info!(
		"selected {} feature columns and {} rows",
		features.ncols(),
		rows.len()
	);
	Ok(Selection { features, target })
}

/// Partition `columns` by the semantic type recorded for each in `profile`. Columns of other semantic types, or not in the profile, are left out.
pub fn semantic_types<S: AsRef<str>>(
	columns: &[S],
	profile: Option<&DatasetProfile>,
) -> Result<SemanticTypePartition> {
	let profile = profile.ok_or(Error::ProfileMissing)?;
	let mut partition = SemanticTypePartition::default();
	for column in columns.iter().map(|column| column.as_ref()) {
		match profile.column(column).map(|profile| profile.semantic_type) {
			Some(SemanticType::Categorical) => partition.categorical.push(column.to_owned()),
			Some(SemanticType::Numeric) => partition.numeric.push(column.to_owned()),
			Some(SemanticType::Boolean) => partition.boolean.push(column.to_owned()),
			_ => {}
		}
	}
	Ok(partition)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::profile::analyze;
	use kitsune_dataframe::{IntegerColumn, NumberColumn, TextColumn};

	fn dataframe() -> DataFrame {
		DataFrame::from_columns(vec![
			DataFrameColumn::Integer(IntegerColumn {
				name: "id".to_owned(),
				data: (1..=10).map(Some).collect(),
			}),
			DataFrameColumn::Number(NumberColumn {
				name: "x".to_owned(),
				data: (0..10).map(|index| (index * index) as f32 / 3.0).collect(),
			}),
			DataFrameColumn::Text(TextColumn {
				name: "label".to_owned(),
				data: (0..10)
					.map(|index| if index == 3 { None } else { Some(format!("c{}", index % 2)) })
					.collect(),
			}),
		])
	}

	#[test]
	fn test_auto() {
		let dataframe = dataframe();
		let profile = analyze(&dataframe.view());
		let selection = select(&dataframe.view(), "label", Some(&profile), &FeatureStrategy::Auto).unwrap();
		assert_eq!(selection.features.column_names(), vec!["x"]);
		assert_eq!(selection.target.len(), 9);
		assert_eq!(selection.features.nrows(), 9);
		assert!(matches!(
			select(&dataframe.view(), "label", None, &FeatureStrategy::Auto),
			Err(Error::ProfileMissing)
		));
	}

	#[test]
	fn test_explicit() {
		let dataframe = dataframe();
		let strategy = FeatureStrategy::Explicit {
			include: None,
			exclude: Some(vec!["x".to_owned()]),
		};
		let selection = select(&dataframe.view(), "label", None, &strategy).unwrap();
		assert_eq!(selection.features.column_names(), vec!["id"]);
		let strategy = FeatureStrategy::Explicit {
			include: None,
			exclude: Some(vec!["label".to_owned()]),
		};
		assert!(matches!(
			select(&dataframe.view(), "label", None, &strategy),
			Err(Error::TargetExcluded(_))
		));
		let strategy = FeatureStrategy::Explicit {
			include: Some(vec!["x".to_owned()]),
			exclude: Some(vec!["id".to_owned()]),
		};
		assert!(matches!(
			select(&dataframe.view(), "label", None, &strategy),
			Err(Error::TargetNotFound(_))
		));
	}

	#[test]
	fn test_empty_include_selects_every_column() {
		let dataframe = dataframe();
		let strategy = FeatureStrategy::Explicit {
			include: Some(vec![]),
			exclude: Some(vec!["x".to_owned()]),
		};
		let selection = select(&dataframe.view(), "label", None, &strategy).unwrap();
		assert_eq!(selection.features.column_names(), vec!["id"]);
		let profile = analyze(&dataframe.view());
		let strategy = FeatureStrategy::Explicit {
			include: Some(vec![]),
			exclude: None,
		};
		let selection = select(&dataframe.view(), "label", Some(&profile), &strategy).unwrap();
		assert_eq!(selection.features.column_names(), vec!["x"]);
	}

	#[test]
	fn test_strategy_serde() {
		let strategy: FeatureStrategy = serde_json::from_str("\"auto\"").unwrap();
		assert_eq!(strategy, FeatureStrategy::Auto);
		let strategy: FeatureStrategy = serde_json::from_str(r#"{"exclude": ["a"]}"#).unwrap();
		assert_eq!(
			strategy,
			FeatureStrategy::Explicit {
				include: None,
				exclude: Some(vec!["a".to_owned()]),
			}
		);
		assert_eq!(serde_json::to_string(&FeatureStrategy::Auto).unwrap(), "\"auto\"");
	}

	#[test]
	fn test_semantic_types() {
		let dataframe = dataframe();
		let profile = analyze(&dataframe.view());
		let partition = semantic_types(&["x", "label", "missing"], Some(&profile)).unwrap();
		assert_eq!(partition.numeric, vec!["x"]);
		assert_eq!(partition.categorical, vec!["label"]);
		assert!(partition.boolean.is_empty());
	}
}
