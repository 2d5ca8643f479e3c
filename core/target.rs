use crate::error::{Error, Result};
use kitsune_dataframe::DataFrameColumnView;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
	Classification,
	Regression,
}

impl Task {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Classification => "classification",
			Self::Regression => "regression",
		}
	}
}

impl std::fmt::Display for Task {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Task {
	type Err = Error;
	fn from_str(value: &str) -> Result<Self> {
		match value {
			"classification" => Ok(Self::Classification),
			"regression" => Ok(Self::Regression),
			_ => Err(Error::InvalidConfig(format!("unknown task \"{}\"", value))),
		}
	}
}

/// The speed versus accuracy tier that presets read their hyperparameters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainMode {
	Fast,
	Balanced,
	Accurate,
}

impl Default for TrainMode {
	fn default() -> Self {
		Self::Balanced
	}
}

impl TrainMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Fast => "fast",
			Self::Balanced => "balanced",
			Self::Accurate => "accurate",
		}
	}
}

impl std::fmt::Display for TrainMode {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for TrainMode {
	type Err = Error;
	fn from_str(value: &str) -> Result<Self> {
		match value {
			"fast" => Ok(Self::Fast),
			"balanced" => Ok(Self::Balanced),
			"accurate" => Ok(Self::Accurate),
			_ => Err(Error::InvalidConfig(format!(
				"unknown train mode \"{}\"",
				value
			))),
		}
	}
}

/// The labels of a dataset, encoded for the estimators. Class labels are indexes into `classes`, which are sorted numerically when every class parses as a number and lexicographically otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
	Classification {
		classes: Vec<String>,
		labels: Vec<usize>,
	},
	Regression {
		values: Vec<f32>,
	},
}

impl Target {
	/// Encode `column` as the target of `task`. The column must not have missing values.
	pub fn from_column(column: &DataFrameColumnView, task: Task) -> Result<Self> {
		let name = column.name();
		if (0..column.len()).any(|index| column.is_missing(index)) {
			return Err(Error::InvalidTarget(format!(
				"target column \"{}\" has missing values",
				name
			)));
		}
		match task {
			Task::Regression => {
				let values = match column {
					DataFrameColumnView::Number(column) => column.data.to_vec(),
					DataFrameColumnView::Integer(column) => column
						.data
						.iter()
						.map(|value| value.map(|value| value as f32).unwrap_or(f32::NAN))
						.collect(),
					_ => {
						return Err(Error::InvalidTarget(format!(
							"target column \"{}\" has storage type {}, which cannot be regressed",
							name,
							column.column_type().name()
						)))
					}
				};
				Ok(Self::Regression { values })
			}
			Task::Classification => {
				if let DataFrameColumnView::Datetime(_) | DataFrameColumnView::Unknown(_) = column {
					return Err(Error::InvalidTarget(format!(
						"target column \"{}\" has storage type {}, which cannot be classified",
						name,
						column.column_type().name()
					)));
				}
				let values: Vec<String> = (0..column.len())
					.filter_map(|index| column.value_to_string(index))
					.collect();
				let classes = sort_classes(values.iter().cloned().collect());
				Self::from_class_names(&values, classes)
			}
		}
	}

	/// Encode `values` against an existing list of `classes`. A value that is not one of the classes is an error.
	pub fn from_class_names(values: &[String], classes: Vec<String>) -> Result<Self> {
		let labels = values
			.iter()
			.map(|value| {
				classes
					.iter()
					.position(|class| class == value)
					.ok_or_else(|| Error::InvalidTarget(format!("unknown class \"{}\"", value)))
			})
			.collect::<Result<Vec<_>>>()?;
		Ok(Self::Classification { classes, labels })
	}

	pub fn task(&self) -> Task {
		match self {
			Self::Classification { .. } => Task::Classification,
			Self::Regression { .. } => Task::Regression,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Self::Classification { labels, .. } => labels.len(),
			Self::Regression { values } => values.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn classes(&self) -> Option<&[String]> {
		match self {
			Self::Classification { classes, .. } => Some(classes),
			Self::Regression { .. } => None,
		}
	}

	/// Copy the labels at `indexes`. Classes are kept, even those that no longer appear.
	pub fn take(&self, indexes: &[usize]) -> Self {
		match self {
			Self::Classification { classes, labels } => Self::Classification {
				classes: classes.clone(),
				labels: indexes.iter().map(|index| labels[*index]).collect(),
			},
			Self::Regression { values } => Self::Regression {
				values: indexes.iter().map(|index| values[*index]).collect(),
			},
		}
	}

	/// Render each label as a string, the class name for classification.
	pub fn to_strings(&self) -> Vec<String> {
		match self {
			Self::Classification { classes, labels } => labels
				.iter()
				.map(|label| classes[*label].clone())
				.collect(),
			Self::Regression { values } => values.iter().map(|value| value.to_string()).collect(),
		}
	}
}

fn sort_classes(classes: BTreeSet<String>) -> Vec<String> {
	let numbers: Option<Vec<f64>> = classes
		.iter()
		.map(|class| class.parse::<f64>().ok())
		.collect();
	let mut classes: Vec<String> = classes.into_iter().collect();
	if let Some(numbers) = numbers {
		let mut pairs: Vec<(f64, String)> = numbers.into_iter().zip(classes).collect();
		pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
		classes = pairs.into_iter().map(|(_, class)| class).collect();
	}
	classes
}

#[cfg(test)]
mod test {
	use super::*;
	use kitsune_dataframe::{DataFrameColumn, IntegerColumn, NumberColumn};

	#[test]
	fn test_classes_sort_numerically() {
		let column = DataFrameColumn::Integer(IntegerColumn {
			name: "grade".to_owned(),
			data: vec![Some(10), Some(2), Some(10), Some(1)],
		});
		let target = Target::from_column(&column.view(), Task::Classification).unwrap();
		assert_eq!(
			target,
			Target::Classification {
				classes: vec!["1".to_owned(), "2".to_owned(), "10".to_owned()],
				labels: vec![2, 1, 2, 0],
			}
		);
	}

	#[test]
	fn test_regression_rejects_missing() {
		let column = DataFrameColumn::Number(NumberColumn {
			name: "price".to_owned(),
			data: vec![1.0, f32::NAN],
		});
		assert!(matches!(
			Target::from_column(&column.view(), Task::Regression),
			Err(Error::InvalidTarget(_))
		));
	}
}
