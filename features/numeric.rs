use super::{numeric_values, FeaturesError};
use itertools::izip;
use kitsune_dataframe::DataFrameColumnView;
use kitsune_metrics::{Metric, MeanVariance};
use kitsune_util::numeric::quantiles;
use ndarray::prelude::*;

/**
A `NumericFeatureGroup` imputes missing values with the median of the fitting data and optionally standardizes the result to zero mean and unit variance. [Learn more](https://en.wikipedia.org/wiki/Feature_scaling#Standardization_(Z-score_Normalization)).

`feature_value = (value - mean) / std`

When the column has zero variance, `std` is taken to be one. When every fitting value is missing, the median is taken to be zero.
*/
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NumericFeatureGroup {
	pub source_column_name: String,
	pub median: f32,
	pub scaler: Option<Scaler>,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Scaler {
	pub mean: f32,
	pub std: f32,
}

impl Scaler {
	pub fn fit(values: &[f32]) -> Self {
		let values: Vec<f64> = values.iter().map(|value| f64::from(*value)).collect();
		match MeanVariance::compute(&values) {
			Some(mean_variance) => {
				let std = mean_variance.variance.sqrt();
				Self {
					mean: mean_variance.mean as f32,
					std: if std > 0.0 { std as f32 } else { 1.0 },
				}
			}
			None => Self {
				mean: 0.0,
				std: 1.0,
			},
		}
	}

	pub fn apply(&self, value: f32) -> f32 {
		(value - self.mean) / self.std
	}
}

/// The median of the values that are not `NaN`, or zero if there are none.
pub fn median(values: &[f32]) -> f32 {
	let values: Vec<f64> = values.iter().map(|value| f64::from(*value)).collect();
	quantiles(&values, &[0.5])
		.into_iter()
		.next()
		.flatten()
		.map(|median| median as f32)
		.unwrap_or(0.0)
}

pub fn impute(values: &mut [f32], fill_value: f32) {
	for value in values.iter_mut() {
		if value.is_nan() {
			*value = fill_value;
		}
	}
}

impl NumericFeatureGroup {
	pub fn fit(column: &DataFrameColumnView, standardize: bool) -> Result<Self, FeaturesError> {
		let mut values = numeric_values(column)?;
		let median = median(&values);
		impute(&mut values, median);
		let scaler = if standardize {
			Some(Scaler::fit(&values))
		} else {
			None
		};
		Ok(Self {
			source_column_name: column.name().to_owned(),
			median,
			scaler,
		})
	}

	pub fn compute(
		&self,
		mut features: ArrayViewMut2<f32>,
		column: &DataFrameColumnView,
	) -> Result<(), FeaturesError> {
		let mut values = numeric_values(column)?;
		impute(&mut values, self.median);
		for (feature, value) in izip!(features.column_mut(0), values.iter()) {
			*feature = match &self.scaler {
				Some(scaler) => scaler.apply(*value),
				None => *value,
			};
		}
		Ok(())
	}
}

#[test]
fn test_standardize() {
	let column = kitsune_dataframe::NumberColumnView {
		name: "values",
		data: &[0.0, 5.2, f32::NAN, 10.0],
	};
	let column = DataFrameColumnView::Number(column);
	let group = NumericFeatureGroup::fit(&column, true).unwrap();
	assert_eq!(group.median, 5.2);
	let mut features = Array2::<f32>::zeros((4, 1));
	group.compute(features.view_mut(), &column).unwrap();
	assert!(features.mean().unwrap().abs() < 1e-6);
	assert_eq!(features[(1, 0)], features[(2, 0)]);
}
