/*!
This crate implements the feature engineering that turns a dataframe into the dense matrix of `f32`s that the models in `kitsune_linear` and `kitsune_tree` are trained on.

A [`Preprocessor`](struct.Preprocessor.html) has three branches, applied in this order:

1. Categorical columns are imputed with the constant `"__missing__"` and then one hot encoded. Categories not seen during fitting encode to all zeros.
2. Numeric columns are imputed with their median and then passed through, standardized, or expanded to degree two polynomial terms and standardized.
3. Boolean columns are imputed with their most frequent value and passed through as 0 or 1.

Every output feature has a name and a parent, the source column it was derived from, which is what explanations are rolled up by.
*/

#![allow(clippy::tabs_in_doc_comments)]

use kitsune_dataframe::{DataFrameColumnView, DataFrameView};
use ndarray::prelude::*;
use thiserror::Error;

mod boolean;
mod numeric;
mod one_hot_encoded;
mod polynomial;

pub use self::boolean::BooleanFeatureGroup;
pub use self::numeric::{NumericFeatureGroup, Scaler};
pub use self::one_hot_encoded::OneHotEncodedFeatureGroup;
pub use self::polynomial::{PolynomialFeatureGroup, PolynomialTerm};

/// The value categorical columns are imputed with before encoding.
pub const MISSING_CATEGORY: &str = "__missing__";

#[derive(Debug, Error)]
pub enum FeaturesError {
	#[error("column \"{0}\" was not found")]
	ColumnNotFound(String),
	#[error("column \"{column}\" has storage type {column_type}, which cannot be used as a {role} feature")]
	UnsupportedColumnType {
		column: String,
		column_type: &'static str,
		role: &'static str,
	},
}

/// How the numeric branch transforms its columns after median imputation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericTransform {
	Passthrough,
	Standardize,
	/// Expand to every column, square, and pairwise product, then standardize each term.
	PolynomialStandardize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreprocessorOptions {
	pub categorical: Vec<String>,
	pub numeric: Vec<String>,
	pub boolean: Vec<String>,
	pub numeric_transform: NumericTransform,
}

/// This struct describes how to transform one or more columns from the input dataframe to one or more columns in the output features.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureGroup {
	OneHotEncoded(OneHotEncodedFeatureGroup),
	Numeric(NumericFeatureGroup),
	Polynomial(PolynomialFeatureGroup),
	Boolean(BooleanFeatureGroup),
}

impl FeatureGroup {
	pub fn n_features(&self) -> usize {
		match self {
			Self::OneHotEncoded(group) => group.n_features(),
			Self::Numeric(_) => 1,
			Self::Polynomial(group) => group.terms.len(),
			Self::Boolean(_) => 1,
		}
	}

	/// The names and parents of the features this group emits, in output order.
	pub fn feature_names_and_parents(&self) -> Vec<(String, String)> {
		match self {
			Self::OneHotEncoded(group) => group.feature_names_and_parents(),
			Self::Numeric(group) => vec![(
				group.source_column_name.clone(),
				group.source_column_name.clone(),
			)],
			Self::Polynomial(group) => group.feature_names_and_parents(),
			Self::Boolean(group) => vec![(
				group.source_column_name.clone(),
				group.source_column_name.clone(),
			)],
		}
	}

	fn compute(
		&self,
		features: ArrayViewMut2<f32>,
		dataframe: &DataFrameView,
	) -> Result<(), FeaturesError> {
		match self {
			Self::OneHotEncoded(group) => {
				group.compute(features, column(dataframe, &group.source_column_name)?)
			}
			Self::Numeric(group) => {
				group.compute(features, column(dataframe, &group.source_column_name)?)
			}
			Self::Polynomial(group) => group.compute(features, dataframe),
			Self::Boolean(group) => {
				group.compute(features, column(dataframe, &group.source_column_name)?)
			}
		}
	}
}

/// A fitted three branch column transformer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Preprocessor {
	pub options: PreprocessorOptions,
	pub feature_groups: Vec<FeatureGroup>,
}

impl Preprocessor {
	/// Fit the feature groups described by `options` to the columns of `dataframe`.
	pub fn fit(
		options: &PreprocessorOptions,
		dataframe: &DataFrameView,
	) -> Result<Self, FeaturesError> {
		let mut feature_groups = Vec::new();
		for column_name in options.categorical.iter() {
			let group = OneHotEncodedFeatureGroup::fit(column(dataframe, column_name)?)?;
			feature_groups.push(FeatureGroup::OneHotEncoded(group));
		}
		match options.numeric_transform {
			NumericTransform::PolynomialStandardize => {
				if !options.numeric.is_empty() {
					let columns = options
						.numeric
						.iter()
						.map(|column_name| column(dataframe, column_name))
						.collect::<Result<Vec<_>, _>>()?;
					let group = PolynomialFeatureGroup::fit(&columns)?;
					feature_groups.push(FeatureGroup::Polynomial(group));
				}
			}
			NumericTransform::Passthrough | NumericTransform::Standardize => {
				let standardize = options.numeric_transform == NumericTransform::Standardize;
				for column_name in options.numeric.iter() {
					let group =
						NumericFeatureGroup::fit(column(dataframe, column_name)?, standardize)?;
					feature_groups.push(FeatureGroup::Numeric(group));
				}
			}
		}
		for column_name in options.boolean.iter() {
			let group = BooleanFeatureGroup::fit(column(dataframe, column_name)?)?;
			feature_groups.push(FeatureGroup::Boolean(group));
		}
		Ok(Self {
			options: options.clone(),
			feature_groups,
		})
	}

	pub fn n_features(&self) -> usize {
		self.feature_groups
			.iter()
			.map(|group| group.n_features())
			.sum()
	}

	pub fn feature_names(&self) -> Vec<String> {
		self.feature_groups
			.iter()
			.flat_map(|group| group.feature_names_and_parents())
			.map(|(name, _)| name)
			.collect()
	}

	pub fn feature_parents(&self) -> Vec<String> {
		self.feature_groups
			.iter()
			.flat_map(|group| group.feature_names_and_parents())
			.map(|(_, parent)| parent)
			.collect()
	}

	/// The names of the dataframe columns this preprocessor reads.
	pub fn source_column_names(&self) -> Vec<String> {
		self.options
			.categorical
			.iter()
			.chain(self.options.numeric.iter())
			.chain(self.options.boolean.iter())
			.cloned()
			.collect()
	}

	/// Compute the feature matrix for `dataframe`, which has shape (n_rows, n_features).
	pub fn transform(&self, dataframe: &DataFrameView) -> Result<Array2<f32>, FeaturesError> {
		let mut features = Array2::<f32>::zeros((dataframe.nrows(), self.n_features()));
		let mut offset = 0;
		for feature_group in self.feature_groups.iter() {
			let n_features = feature_group.n_features();
			let slice = features.slice_mut(s![.., offset..offset + n_features]);
			feature_group.compute(slice, dataframe)?;
			offset += n_features;
		}
		Ok(features)
	}
}

fn column<'a, 'b>(
	dataframe: &'b DataFrameView<'a>,
	name: &str,
) -> Result<&'b DataFrameColumnView<'a>, FeaturesError> {
	dataframe
		.column(name)
		.ok_or_else(|| FeaturesError::ColumnNotFound(name.to_owned()))
}

/// Read a column as numbers, with `NaN` for missing values.
fn numeric_values(column: &DataFrameColumnView) -> Result<Vec<f32>, FeaturesError> {
	match column {
		DataFrameColumnView::Number(column) => Ok(column.data.to_vec()),
		DataFrameColumnView::Integer(column) => Ok(column
			.data
			.iter()
			.map(|value| value.map(|value| value as f32).unwrap_or(f32::NAN))
			.collect()),
		DataFrameColumnView::Boolean(column) => Ok(column
			.data
			.iter()
			.map(|value| match value {
				Some(true) => 1.0,
				Some(false) => 0.0,
				None => f32::NAN,
			})
			.collect()),
		DataFrameColumnView::Unknown(column) => Ok(vec![f32::NAN; column.len]),
		_ => Err(FeaturesError::UnsupportedColumnType {
			column: column.name().to_owned(),
			column_type: column.column_type().name(),
			role: "numeric",
		}),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use kitsune_dataframe::{
		BooleanColumn, DataFrame, DataFrameColumn, EnumColumn, IntegerColumn, NumberColumn,
	};
	use std::num::NonZeroUsize;

	fn dataframe() -> DataFrame {
		DataFrame::from_columns(vec![
			DataFrameColumn::Enum(EnumColumn {
				name: "color".to_owned(),
				options: vec!["blue".to_owned(), "red".to_owned()],
				data: vec![NonZeroUsize::new(1), NonZeroUsize::new(2), None, NonZeroUsize::new(2)],
			}),
			DataFrameColumn::Number(NumberColumn {
				name: "height".to_owned(),
				data: vec![1.0, f32::NAN, 3.0, 5.0],
			}),
			DataFrameColumn::Integer(IntegerColumn {
				name: "age".to_owned(),
				data: vec![Some(10), Some(20), Some(30), None],
			}),
			DataFrameColumn::Boolean(BooleanColumn {
				name: "active".to_owned(),
				data: vec![Some(true), None, Some(false), Some(true)],
			}),
		])
	}

	fn options(numeric_transform: NumericTransform) -> PreprocessorOptions {
		PreprocessorOptions {
			categorical: vec!["color".to_owned()],
			numeric: vec!["height".to_owned(), "age".to_owned()],
			boolean: vec!["active".to_owned()],
			numeric_transform,
		}
	}

	#[test]
	fn test_names_and_parents() {
		let dataframe = dataframe();
		let preprocessor =
			Preprocessor::fit(&options(NumericTransform::Passthrough), &dataframe.view()).unwrap();
		assert_eq!(
			preprocessor.feature_names(),
			vec![
				"color=__missing__",
				"color=blue",
				"color=red",
				"height",
				"age",
				"active"
			]
		);
		assert_eq!(
			preprocessor.feature_parents(),
			vec!["color", "color", "color", "height", "age", "active"]
		);
		let features = preprocessor.transform(&dataframe.view()).unwrap();
		assert_eq!(features.dim(), (4, preprocessor.n_features()));
		assert_eq!(
			features,
			arr2(&[
				[0.0, 1.0, 0.0, 1.0, 10.0, 1.0],
				[0.0, 0.0, 1.0, 3.0, 20.0, 1.0],
				[1.0, 0.0, 0.0, 3.0, 30.0, 0.0],
				[0.0, 0.0, 1.0, 5.0, 20.0, 1.0],
			])
		);
	}

	#[test]
	fn test_polynomial_names_match_width() {
		let dataframe = dataframe();
		let preprocessor = Preprocessor::fit(
			&options(NumericTransform::PolynomialStandardize),
			&dataframe.view(),
		)
		.unwrap();
		let names = preprocessor.feature_names();
		let parents = preprocessor.feature_parents();
		assert_eq!(names.len(), preprocessor.n_features());
		assert_eq!(parents.len(), names.len());
		assert_eq!(
			&names[3..8],
			&["height", "age", "height^2", "height*age", "age^2"]
		);
		assert_eq!(&parents[3..8], &["height", "age", "height", "height*age", "age"]);
		let features = preprocessor.transform(&dataframe.view()).unwrap();
		// Standardized terms have zero mean on the data they were fit on.
		for column in features.slice(s![.., 3..8]).columns() {
			assert!(column.mean().unwrap().abs() < 1e-5);
		}
	}

	#[test]
	fn test_missing_column() {
		let dataframe = dataframe();
		let mut options = options(NumericTransform::Standardize);
		options.numeric.push("weight".to_owned());
		let result = Preprocessor::fit(&options, &dataframe.view());
		assert!(matches!(result, Err(FeaturesError::ColumnNotFound(name)) if name == "weight"));
	}
}
