use super::{
	numeric::{impute, median, Scaler},
	numeric_values, FeaturesError,
};
use kitsune_dataframe::{DataFrameColumnView, DataFrameView};
use ndarray::prelude::*;

/**
A `PolynomialFeatureGroup` expands a set of numeric columns into every degree one and degree two term and standardizes each term. Each source column is first imputed with its median.

For columns `a` and `b` the terms are emitted in the order `a`, `b`, `a^2`, `a*b`, `b^2`.
*/
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PolynomialFeatureGroup {
	pub source_column_names: Vec<String>,
	pub medians: Vec<f32>,
	pub terms: Vec<PolynomialTerm>,
	/// One scaler per term.
	pub scalers: Vec<Scaler>,
}

/// A term refers to source columns by their index in `source_column_names`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolynomialTerm {
	Linear { column: usize },
	Square { column: usize },
	Interaction { left: usize, right: usize },
}

impl PolynomialTerm {
	fn evaluate(&self, values: &[Vec<f32>], row: usize) -> f32 {
		match self {
			Self::Linear { column } => values[*column][row],
			Self::Square { column } => values[*column][row] * values[*column][row],
			Self::Interaction { left, right } => values[*left][row] * values[*right][row],
		}
	}
}

fn terms(n_columns: usize) -> Vec<PolynomialTerm> {
	let mut terms: Vec<PolynomialTerm> = (0..n_columns)
		.map(|column| PolynomialTerm::Linear { column })
		.collect();
	for left in 0..n_columns {
		for right in left..n_columns {
			if left == right {
				terms.push(PolynomialTerm::Square { column: left });
			} else {
				terms.push(PolynomialTerm::Interaction { left, right });
			}
		}
	}
	terms
}

impl PolynomialFeatureGroup {
	pub fn fit(columns: &[&DataFrameColumnView]) -> Result<Self, FeaturesError> {
		let mut values = Vec::with_capacity(columns.len());
		let mut medians = Vec::with_capacity(columns.len());
		for column in columns.iter() {
			let mut column_values = numeric_values(column)?;
			let column_median = median(&column_values);
			impute(&mut column_values, column_median);
			medians.push(column_median);
			values.push(column_values);
		}
		let n_rows = columns.first().map(|column| column.len()).unwrap_or(0);
		let terms = terms(columns.len());
		let scalers = terms
			.iter()
			.map(|term| {
				let term_values: Vec<f32> =
					(0..n_rows).map(|row| term.evaluate(&values, row)).collect();
				Scaler::fit(&term_values)
			})
			.collect();
		Ok(Self {
			source_column_names: columns
				.iter()
				.map(|column| column.name().to_owned())
				.collect(),
			medians,
			terms,
			scalers,
		})
	}

	/// Squares have the source column as their parent. An interaction is its own parent, named `a*b`.
	pub fn feature_names_and_parents(&self) -> Vec<(String, String)> {
		let names = &self.source_column_names;
		self.terms
			.iter()
			.map(|term| match term {
				PolynomialTerm::Linear { column } => (names[*column].clone(), names[*column].clone()),
				PolynomialTerm::Square { column } => {
					(format!("{}^2", names[*column]), names[*column].clone())
				}
				PolynomialTerm::Interaction { left, right } => {
					let name = format!("{}*{}", names[*left], names[*right]);
					(name.clone(), name)
				}
			})
			.collect()
	}

	pub fn compute(
		&self,
		mut features: ArrayViewMut2<f32>,
		dataframe: &DataFrameView,
	) -> Result<(), FeaturesError> {
		let mut values = Vec::with_capacity(self.source_column_names.len());
		for (column_name, column_median) in self.source_column_names.iter().zip(self.medians.iter())
		{
			let column = super::column(dataframe, column_name)?;
			let mut column_values = numeric_values(column)?;
			impute(&mut column_values, *column_median);
			values.push(column_values);
		}
		for (term_index, (term, scaler)) in self.terms.iter().zip(self.scalers.iter()).enumerate() {
			for (row, feature) in features.column_mut(term_index).iter_mut().enumerate() {
				*feature = scaler.apply(term.evaluate(&values, row));
			}
		}
		Ok(())
	}
}

#[test]
fn test_terms() {
	assert_eq!(
		terms(3),
		vec![
			PolynomialTerm::Linear { column: 0 },
			PolynomialTerm::Linear { column: 1 },
			PolynomialTerm::Linear { column: 2 },
			PolynomialTerm::Square { column: 0 },
			PolynomialTerm::Interaction { left: 0, right: 1 },
			PolynomialTerm::Interaction { left: 0, right: 2 },
			PolynomialTerm::Square { column: 1 },
			PolynomialTerm::Interaction { left: 1, right: 2 },
			PolynomialTerm::Square { column: 2 },
		]
	);
}
