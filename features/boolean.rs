use super::FeaturesError;
use kitsune_dataframe::DataFrameColumnView;
use kitsune_metrics::{Metric, Mode};
use ndarray::prelude::*;

/// A `BooleanFeatureGroup` passes a boolean column through as 0 or 1, imputing missing values with the most frequent value of the fitting data. Ties, and columns with no values, impute `false`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BooleanFeatureGroup {
	pub source_column_name: String,
	pub fill_value: bool,
}

impl BooleanFeatureGroup {
	pub fn fit(column: &DataFrameColumnView) -> Result<Self, FeaturesError> {
		let values: Vec<usize> = boolean_values(column)?
			.into_iter()
			.flatten()
			.map(|value| value as usize)
			.collect();
		let fill_value = Mode::compute(&values).map(|mode| mode == 1).unwrap_or(false);
		Ok(Self {
			source_column_name: column.name().to_owned(),
			fill_value,
		})
	}

	pub fn compute(
		&self,
		mut features: ArrayViewMut2<f32>,
		column: &DataFrameColumnView,
	) -> Result<(), FeaturesError> {
		let values = boolean_values(column)?;
		for (feature, value) in features.column_mut(0).iter_mut().zip(values.iter()) {
			*feature = if value.unwrap_or(self.fill_value) {
				1.0
			} else {
				0.0
			};
		}
		Ok(())
	}
}

fn boolean_values(column: &DataFrameColumnView) -> Result<Vec<Option<bool>>, FeaturesError> {
	match column {
		DataFrameColumnView::Boolean(column) => Ok(column.data.to_vec()),
		DataFrameColumnView::Unknown(column) => Ok(vec![None; column.len]),
		_ => Err(FeaturesError::UnsupportedColumnType {
			column: column.name().to_owned(),
			column_type: column.column_type().name(),
			role: "boolean",
		}),
	}
}
