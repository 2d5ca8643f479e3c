use super::{FeaturesError, MISSING_CATEGORY};
use fnv::FnvHashMap;
use kitsune_dataframe::DataFrameColumnView;
use ndarray::prelude::*;
use std::collections::BTreeSet;

/**
A `OneHotEncodedFeatureGroup` creates one feature for each category seen while fitting. Missing values are first replaced with `"__missing__"`, which becomes a category of its own if the fitting data had missing values.

# Example

| dataframe value | color=__missing__ | color=blue | color=red |
|-----------------|-------------------|------------|-----------|
| "red"           | 0                 | 0          | 1         |
| missing         | 1                 | 0          | 0         |
| "green"         | 0                 | 0          | 0         |
*/
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OneHotEncodedFeatureGroup {
	pub source_column_name: String,
	/// The categories in sorted order.
	pub categories: Vec<String>,
}

impl OneHotEncodedFeatureGroup {
	pub fn fit(column: &DataFrameColumnView) -> Result<Self, FeaturesError> {
		let categories: BTreeSet<String> = category_values(column)?
			.into_iter()
			.map(|value| value.unwrap_or_else(|| MISSING_CATEGORY.to_owned()))
			.collect();
		Ok(Self {
			source_column_name: column.name().to_owned(),
			categories: categories.into_iter().collect(),
		})
	}

	pub fn n_features(&self) -> usize {
		self.categories.len()
	}

	pub fn feature_names_and_parents(&self) -> Vec<(String, String)> {
		self.categories
			.iter()
			.map(|category| {
				(
					format!("{}={}", self.source_column_name, category),
					self.source_column_name.clone(),
				)
			})
			.collect()
	}

	pub fn compute(
		&self,
		mut features: ArrayViewMut2<f32>,
		column: &DataFrameColumnView,
	) -> Result<(), FeaturesError> {
		let indexes: FnvHashMap<&str, usize> = self
			.categories
			.iter()
			.enumerate()
			.map(|(index, category)| (category.as_str(), index))
			.collect();
		let values = category_values(column)?;
		for (mut row, value) in features.rows_mut().into_iter().zip(values.iter()) {
			let value = value.as_deref().unwrap_or(MISSING_CATEGORY);
			// Unknown categories encode to all zeros.
			if let Some(index) = indexes.get(value) {
				row[*index] = 1.0;
			}
		}
		Ok(())
	}
}

fn category_values(column: &DataFrameColumnView) -> Result<Vec<Option<String>>, FeaturesError> {
	match column {
		DataFrameColumnView::Datetime(_) => Err(FeaturesError::UnsupportedColumnType {
			column: column.name().to_owned(),
			column_type: "datetime",
			role: "categorical",
		}),
		_ => Ok((0..column.len())
			.map(|index| column.value_to_string(index))
			.collect()),
	}
}
