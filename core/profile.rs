/*!
This module profiles a dataframe: it infers the semantic type of each column, computes summary statistics, suggests which analysis the column would suit as a target, and flags columns that should be excluded from training.
*/

use fnv::FnvHashMap;
use indexmap::IndexMap;
use kitsune_dataframe::{DataFrameColumnView, DataFrameView};
use kitsune_metrics::{MeanVariance, Metric};
use kitsune_util::{finite::ToFinite, numeric::round_to};
use std::collections::BTreeMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
	Numeric,
	Categorical,
	Boolean,
	Datetime,
	Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAnalysis {
	Classification,
	Regression,
	None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
	Empty,
	Constant,
	IdLike,
	Datetime,
	UnsupportedDtype,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileWarning {
	/// A categorical column with many distinct values and no dominant ones. It is kept.
	HighCardinality,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
	Numeric {
		min: f64,
		max: f64,
		mean: f64,
		/// The sample standard deviation, absent when there is a single value.
		std: Option<f64>,
	},
	Categorical {
		top_value: String,
		top_count: usize,
		top_freq_ratio: f64,
		coverage_top3: f64,
	},
	Boolean {
		true_pct: f64,
		false_pct: f64,
	},
	Datetime {
		earliest: String,
		latest: String,
	},
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnProfile {
	pub dtype_raw: String,
	pub semantic_type: SemanticType,
	pub cardinality: Option<usize>,
	pub cardinality_ratio: Option<f64>,
	pub missing_pct: f64,
	pub is_empty: bool,
	pub is_constant: bool,
	pub is_unique: bool,
	pub suggested_analysis: SuggestedAnalysis,
	pub exclude_for_analysis: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exclusion_reason: Option<ExclusionReason>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub warning: Option<ProfileWarning>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stats: Option<ColumnStats>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProfileSummary {
	pub n_rows: usize,
	pub n_cols: usize,
	pub missing_pct: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DatasetProfile {
	pub summary: ProfileSummary,
	/// The profile of each column, in the order the columns appear in the dataframe.
	pub columns: IndexMap<String, ColumnProfile>,
	pub id_candidates: Vec<String>,
	pub exclude_suggestions: Vec<String>,
}

impl DatasetProfile {
	pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
		self.columns.get(name)
	}
}

/// The thresholds the profiler uses to suggest analyses.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSettings {
	/// Columns with a cardinality ratio at or below this look like classes.
	pub low_cardinality_ratio: f64,
	/// Columns whose three most frequent values cover at least this fraction of the values look like classes.
	pub top3_coverage: f64,
	/// Unique integer columns where at least this fraction of the sorted consecutive differences equal one look like ids.
	pub sequence_like_ratio: f64,
}

impl Default for ProfileSettings {
	fn default() -> Self {
		Self {
			low_cardinality_ratio: 0.2,
			top3_coverage: 0.8,
			sequence_like_ratio: 0.9,
		}
	}
}

/// Profile every column of `dataframe` with the default settings.
pub fn analyze(dataframe: &DataFrameView) -> DatasetProfile {
	analyze_with_settings(dataframe, &ProfileSettings::default())
}

pub fn analyze_with_settings(dataframe: &DataFrameView, settings: &ProfileSettings) -> DatasetProfile {
	let n_rows = dataframe.nrows();
	let n_cols = dataframe.ncols();
	if n_rows == 0 || n_cols == 0 {
		return DatasetProfile {
			summary: ProfileSummary {
				n_rows,
				n_cols,
				missing_pct: 0.0,
			},
			columns: IndexMap::new(),
			id_candidates: Vec::new(),
			exclude_suggestions: Vec::new(),
		};
	}
	let mut n_missing_cells = 0;
	let mut columns = IndexMap::new();
	let mut id_candidates = Vec::new();
	let mut exclude_suggestions = Vec::new();
	for column in dataframe.columns.iter() {
		n_missing_cells += column.n_missing();
		let profile = analyze_column(column, settings);
		if profile.is_unique {
			id_candidates.push(column.name().to_owned());
		}
		if profile.exclude_for_analysis {
			exclude_suggestions.push(column.name().to_owned());
		}
		columns.insert(column.name().to_owned(), profile);
	}
	let missing_pct = round_to(n_missing_cells as f64 / (n_rows * n_cols) as f64, 4);
	log::debug!(
		"profiled {} columns, {} excluded",
		n_cols,
		exclude_suggestions.len()
	);
	DatasetProfile {
		summary: ProfileSummary {
			n_rows,
			n_cols,
			missing_pct,
		},
		columns,
		id_candidates,
		exclude_suggestions,
	}
}

/// Map each column to the name of its storage type.
pub fn suggest_schema(dataframe: &DataFrameView) -> BTreeMap<String, String> {
	dataframe
		.columns
		.iter()
		.map(|column| {
			(
				column.name().to_owned(),
				column.column_type().name().to_owned(),
			)
		})
		.collect()
}

fn analyze_column(column: &DataFrameColumnView, settings: &ProfileSettings) -> ColumnProfile {
	let n_values = column.len();
	let n_non_missing = n_values - column.n_missing();
	let mut profile = ColumnProfile {
		dtype_raw: column.column_type().name().to_owned(),
		semantic_type: SemanticType::Unknown,
		cardinality: None,
		cardinality_ratio: None,
		missing_pct: round_to(1.0 - n_non_missing as f64 / n_values as f64, 4),
		is_empty: false,
		is_constant: false,
		is_unique: false,
		suggested_analysis: SuggestedAnalysis::None,
		exclude_for_analysis: false,
		exclusion_reason: None,
		warning: None,
		stats: None,
	};
	if n_non_missing == 0 {
		profile.is_empty = true;
		profile.is_constant = true;
		profile.exclude_for_analysis = true;
		profile.exclusion_reason = Some(ExclusionReason::Empty);
		return profile;
	}
	match column {
		DataFrameColumnView::Integer(column) => {
			let values: Vec<i64> = column.data.iter().flatten().copied().collect();
			let counts = value_counts(values.iter().copied());
			set_cardinality(&mut profile, counts.len(), n_non_missing);
			profile.semantic_type = SemanticType::Numeric;
			let as_floats: Vec<f64> = values.iter().map(|value| *value as f64).collect();
			profile.stats = Some(numeric_stats(&as_floats));
			if profile.is_constant {
				return exclude(profile, ExclusionReason::Constant);
			}
			let coverage = coverage_top3(&counts, n_non_missing);
			let ratio = counts.len() as f64 / n_non_missing as f64;
			if ratio <= settings.low_cardinality_ratio || coverage >= settings.top3_coverage {
				profile.suggested_analysis = SuggestedAnalysis::Classification;
			} else if profile.is_unique
				&& profile.missing_pct == 0.0
				&& is_sequence_like(&values, settings.sequence_like_ratio)
			{
				return exclude(profile, ExclusionReason::IdLike);
			} else {
				profile.suggested_analysis = SuggestedAnalysis::Regression;
			}
			profile
		}
		DataFrameColumnView::Number(column) => {
			let values: Vec<f32> = column
				.data
				.iter()
				.copied()
				.filter(|value| !value.is_nan())
				.collect();
			// Infinities are values too. They are keyed by their bits since they have no finite ordering.
			let cardinality = value_counts(
				values
					.iter()
					.map(|value| value.to_finite().map_err(|_| value.to_bits())),
			)
			.len();
			set_cardinality(&mut profile, cardinality, n_non_missing);
			profile.semantic_type = SemanticType::Numeric;
			let as_floats: Vec<f64> = values.iter().map(|value| f64::from(*value)).collect();
			profile.stats = Some(numeric_stats(&as_floats));
			if profile.is_constant {
				return exclude(profile, ExclusionReason::Constant);
			}
			profile.suggested_analysis = SuggestedAnalysis::Regression;
			profile
		}
		DataFrameColumnView::Enum(_) | DataFrameColumnView::Text(_) => {
			let counts = value_counts((0..n_values).filter_map(|index| column.value_to_string(index)));
			set_cardinality(&mut profile, counts.len(), n_non_missing);
			profile.semantic_type = SemanticType::Categorical;
			let coverage = coverage_top3(&counts, n_non_missing);
			if let Some((top_value, top_count)) = counts.first() {
				profile.stats = Some(ColumnStats::Categorical {
					top_value: top_value.clone(),
					top_count: *top_count,
					top_freq_ratio: round_to(*top_count as f64 / n_non_missing as f64, 4),
					coverage_top3: round_to(coverage, 4),
				});
			}
			if profile.is_unique {
				return exclude(profile, ExclusionReason::IdLike);
			}
			if profile.is_constant {
				return exclude(profile, ExclusionReason::Constant);
			}
			let ratio = counts.len() as f64 / n_non_missing as f64;
			if ratio <= settings.low_cardinality_ratio || coverage >= settings.top3_coverage {
				profile.suggested_analysis = SuggestedAnalysis::Classification;
			} else {
				log::warn!(
					"column \"{}\" has {} distinct categories and is kept",
					column.name(),
					counts.len()
				);
				profile.warning = Some(ProfileWarning::HighCardinality);
			}
			profile
		}
		DataFrameColumnView::Boolean(column) => {
			let values: Vec<bool> = column.data.iter().flatten().copied().collect();
			let counts = value_counts(values.iter().copied());
			set_cardinality(&mut profile, counts.len(), n_non_missing);
			profile.semantic_type = SemanticType::Boolean;
			let n_true = values.iter().filter(|value| **value).count();
			profile.stats = Some(ColumnStats::Boolean {
				true_pct: round_to(n_true as f64 / n_non_missing as f64, 4),
				false_pct: round_to((n_non_missing - n_true) as f64 / n_non_missing as f64, 4),
			});
			if profile.is_constant {
				return exclude(profile, ExclusionReason::Constant);
			}
			profile.suggested_analysis = SuggestedAnalysis::Classification;
			profile
		}
		DataFrameColumnView::Datetime(column) => {
			let values: Vec<_> = column.data.iter().flatten().copied().collect();
			let counts = value_counts(values.iter().copied());
			set_cardinality(&mut profile, counts.len(), n_non_missing);
			profile.semantic_type = SemanticType::Datetime;
			if let (Some(earliest), Some(latest)) = (values.iter().min(), values.iter().max()) {
				profile.stats = Some(ColumnStats::Datetime {
					earliest: earliest.date().to_string(),
					latest: latest.date().to_string(),
				});
			}
			if profile.is_constant {
				return exclude(profile, ExclusionReason::Constant);
			}
			exclude(profile, ExclusionReason::Datetime)
		}
		DataFrameColumnView::Unknown(_) => exclude(profile, ExclusionReason::UnsupportedDtype),
	}
}

fn exclude(mut profile: ColumnProfile, reason: ExclusionReason) -> ColumnProfile {
	profile.exclude_for_analysis = true;
	profile.exclusion_reason = Some(reason);
	profile
}

fn set_cardinality(profile: &mut ColumnProfile, cardinality: usize, n_non_missing: usize) {
	profile.cardinality = Some(cardinality);
	profile.cardinality_ratio = Some(round_to(cardinality as f64 / n_non_missing as f64, 4));
	profile.is_unique = cardinality == n_non_missing;
	profile.is_constant = cardinality < 2;
}

/// Count each distinct value, most frequent first. Ties keep the order in which the values first appear.
fn value_counts<T, I>(values: I) -> Vec<(T, usize)>
where
	T: Hash + Eq + Clone,
	I: Iterator<Item = T>,
{
	let mut counts: FnvHashMap<T, (usize, usize)> = FnvHashMap::default();
	for (position, value) in values.enumerate() {
		counts.entry(value).or_insert((0, position)).0 += 1;
	}
	let mut counts: Vec<(T, usize, usize)> = counts
		.into_iter()
		.map(|(value, (count, first))| (value, count, first))
		.collect();
	counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
	counts
		.into_iter()
		.map(|(value, count, _)| (value, count))
		.collect()
}

fn coverage_top3<T>(counts: &[(T, usize)], n_non_missing: usize) -> f64 {
	let top: usize = counts.iter().take(3).map(|(_, count)| count).sum();
	top as f64 / n_non_missing as f64
}

fn is_sequence_like(values: &[i64], threshold: f64) -> bool {
	if values.len() < 2 {
		return false;
	}
	let mut sorted = values.to_vec();
	sorted.sort_unstable();
	let n_consecutive = sorted
		.windows(2)
		.filter(|pair| pair[0].checked_add(1) == Some(pair[1]))
		.count();
	n_consecutive as f64 / (sorted.len() - 1) as f64 >= threshold
}

fn numeric_stats(values: &[f64]) -> ColumnStats {
	let min = values.iter().copied().fold(f64::INFINITY, f64::min);
	let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
	let (mean, std) = match MeanVariance::compute(values) {
		Some(output) => {
			let std = output.sample_variance.sqrt();
			(output.mean, if std.is_nan() { None } else { Some(round_to(std, 4)) })
		}
		None => (f64::NAN, None),
	};
	ColumnStats::Numeric {
		min: round_to(min, 4),
		max: round_to(max, 4),
		mean: round_to(mean, 4),
		std,
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use kitsune_dataframe::{
		BooleanColumn, DataFrame, DataFrameColumn, IntegerColumn, NumberColumn, TextColumn,
		UnknownColumn,
	};

	#[test]
	fn test_twenty_rows() {
		let ids: Vec<Option<i64>> = (1..=20).map(Some).collect();
		let segments: Vec<Option<i64>> = (0..20).map(|index| Some(index % 2)).collect();
		let constant = vec![Some(7); 20];
		let groups: Vec<Option<String>> = (0..20)
			.map(|index| Some(if index % 2 == 0 { "a" } else { "b" }.to_owned()))
			.collect();
		let target: Vec<f32> = (0..20).map(|index| index as f32 * 1.5).collect();
		let dataframe = DataFrame::from_columns(vec![
			DataFrameColumn::Integer(IntegerColumn {
				name: "id".to_owned(),
				data: ids,
			}),
			DataFrameColumn::Integer(IntegerColumn {
				name: "segment".to_owned(),
				data: segments,
			}),
			DataFrameColumn::Integer(IntegerColumn {
				name: "constant".to_owned(),
				data: constant,
			}),
			DataFrameColumn::Text(TextColumn {
				name: "group".to_owned(),
				data: groups,
			}),
			DataFrameColumn::Number(NumberColumn {
				name: "target".to_owned(),
				data: target,
			}),
			DataFrameColumn::Unknown(UnknownColumn {
				name: "empty".to_owned(),
				len: 20,
			}),
		]);
		let profile = analyze(&dataframe.view());
		assert_eq!(profile.summary.n_rows, 20);
		assert_eq!(profile.summary.missing_pct, 0.1667);
		let names: Vec<&String> = profile.columns.keys().collect();
		assert_eq!(
			names,
			vec!["id", "segment", "constant", "group", "target", "empty"]
		);

		let id = profile.column("id").unwrap();
		assert!(id.is_unique);
		assert_eq!(id.exclusion_reason, Some(ExclusionReason::IdLike));

		let segment = profile.column("segment").unwrap();
		assert_eq!(segment.cardinality, Some(2));
		assert_eq!(segment.cardinality_ratio, Some(0.1));
		assert_eq!(segment.suggested_analysis, SuggestedAnalysis::Classification);
		assert!(!segment.exclude_for_analysis);

		let constant = profile.column("constant").unwrap();
		assert!(constant.is_constant);
		assert_eq!(constant.exclusion_reason, Some(ExclusionReason::Constant));

		let group = profile.column("group").unwrap();
		assert_eq!(group.semantic_type, SemanticType::Categorical);
		assert_eq!(group.cardinality, Some(2));
		assert_eq!(group.suggested_analysis, SuggestedAnalysis::Classification);
		assert!(!group.exclude_for_analysis);

		let target = profile.column("target").unwrap();
		assert_eq!(target.semantic_type, SemanticType::Numeric);
		assert_eq!(target.suggested_analysis, SuggestedAnalysis::Regression);

		let empty = profile.column("empty").unwrap();
		assert!(empty.is_empty && empty.is_constant && empty.exclude_for_analysis);
		assert_eq!(empty.cardinality, None);
		assert_eq!(empty.cardinality_ratio, None);

		assert_eq!(profile.id_candidates, vec!["id", "target"]);
		assert_eq!(profile.exclude_suggestions, vec!["id", "constant", "empty"]);
	}

	#[test]
	fn test_categorical() {
		let values: Vec<Option<String>> = (0..10).map(|index| Some(format!("user{}", index))).collect();
		let mut spread: Vec<Option<String>> = (0..10).map(|index| Some(format!("v{}", index / 2))).collect();
		spread.push(None);
		let dataframe = DataFrame::from_columns(vec![
			DataFrameColumn::Text(TextColumn {
				name: "user".to_owned(),
				data: values,
			}),
			DataFrameColumn::Boolean(BooleanColumn {
				name: "active".to_owned(),
				data: vec![Some(true), Some(true), Some(false), Some(true), None, Some(true), Some(false), Some(true), Some(true), Some(true)],
			}),
		]);
		let profile = analyze(&dataframe.view());
		let user = profile.column("user").unwrap();
		assert_eq!(user.semantic_type, SemanticType::Categorical);
		assert_eq!(user.exclusion_reason, Some(ExclusionReason::IdLike));
		let active = profile.column("active").unwrap();
		assert_eq!(
			active.stats,
			Some(ColumnStats::Boolean {
				true_pct: 0.7778,
				false_pct: 0.2222,
			})
		);
		assert_eq!(active.missing_pct, 0.1);

		let spread = DataFrame::from_columns(vec![DataFrameColumn::Text(TextColumn {
			name: "spread".to_owned(),
			data: spread,
		})]);
		let profile = analyze(&spread.view());
		let spread = profile.column("spread").unwrap();
		assert_eq!(spread.cardinality_ratio, Some(0.5));
		assert_eq!(spread.warning, Some(ProfileWarning::HighCardinality));
		assert!(!spread.exclude_for_analysis);
		assert_eq!(
			spread.stats,
			Some(ColumnStats::Categorical {
				top_value: "v0".to_owned(),
				top_count: 2,
				top_freq_ratio: 0.2,
				coverage_top3: 0.6,
			})
		);
	}

	#[test]
	fn test_wide_integer_range() {
		let dataframe = DataFrame::from_columns(vec![DataFrameColumn::Integer(IntegerColumn {
			name: "key".to_owned(),
			data: vec![Some(i64::MIN), Some(0), Some(i64::MAX), Some(1), Some(2)],
		})]);
		let profile = analyze(&dataframe.view());
		let key = profile.column("key").unwrap();
		assert!(key.is_unique);
		assert_eq!(key.suggested_analysis, SuggestedAnalysis::Regression);
		assert!(!key.exclude_for_analysis);
		assert!(!is_sequence_like(&[i64::MIN, i64::MAX], 0.9));
		assert!(is_sequence_like(&[i64::MAX - 1, i64::MAX], 0.9));
	}

	#[test]
	fn test_infinite_numbers_are_distinct_values() {
		let dataframe = DataFrame::from_columns(vec![DataFrameColumn::Number(NumberColumn {
			name: "x".to_owned(),
			data: vec![1.0, f32::INFINITY, f32::NEG_INFINITY, f32::NAN],
		})]);
		let profile = analyze(&dataframe.view());
		let x = profile.column("x").unwrap();
		assert_eq!(x.cardinality, Some(3));
		assert!(x.is_unique);
		assert!(!x.is_constant);
		assert_eq!(x.missing_pct, 0.25);
	}

	#[test]
	fn test_empty_dataframe() {
		let profile = analyze(&DataFrame::from_columns(Vec::new()).view());
		assert!(profile.columns.is_empty());
		assert_eq!(profile.summary.missing_pct, 0.0);
	}
}
