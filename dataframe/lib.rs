/*!
This crate provides a basic implementation of dataframes, which are two dimensional arrays of data where each column can have a different data type, like a spreadsheet. A column's storage type is decided once, when the dataframe is loaded, and the rest of kitsune reasons about columns through these storage types.

Missing values are represented per type: `NaN` for number columns and `None` for every other column type.
*/

#![allow(clippy::tabs_in_doc_comments)]

use chrono::NaiveDateTime;
use std::num::NonZeroUsize;

mod load;

pub use self::load::*;

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
	pub columns: Vec<DataFrameColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrameView<'a> {
	pub columns: Vec<DataFrameColumnView<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataFrameColumn {
	Unknown(UnknownColumn),
	Number(NumberColumn),
	Integer(IntegerColumn),
	Boolean(BooleanColumn),
	Enum(EnumColumn),
	Datetime(DatetimeColumn),
	Text(TextColumn),
}

/// An `UnknownColumn` is a column whose values were all missing, so no type could be inferred for it.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownColumn {
	pub name: String,
	pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumn {
	pub name: String,
	pub data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerColumn {
	pub name: String,
	pub data: Vec<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanColumn {
	pub name: String,
	pub data: Vec<Option<bool>>,
}

/// An `EnumColumn` stores 1-indexed positions into `options`, with `None` for missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumColumn {
	pub name: String,
	pub options: Vec<String>,
	pub data: Vec<Option<NonZeroUsize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatetimeColumn {
	pub name: String,
	pub data: Vec<Option<NaiveDateTime>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
	pub name: String,
	pub data: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataFrameColumnView<'a> {
	Unknown(UnknownColumnView<'a>),
	Number(NumberColumnView<'a>),
	Integer(IntegerColumnView<'a>),
	Boolean(BooleanColumnView<'a>),
	Enum(EnumColumnView<'a>),
	Datetime(DatetimeColumnView<'a>),
	Text(TextColumnView<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownColumnView<'a> {
	pub name: &'a str,
	pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [f32],
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [Option<i64>],
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [Option<bool>],
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumColumnView<'a> {
	pub name: &'a str,
	pub options: &'a [String],
	pub data: &'a [Option<NonZeroUsize>],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatetimeColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [Option<NaiveDateTime>],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [Option<String>],
}

/// The storage type of a column. This is what a user may specify in place of type inference when loading a csv.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataFrameColumnType {
	Unknown,
	Number,
	Integer,
	Boolean,
	Enum { options: Vec<String> },
	Datetime,
	Text,
}

impl DataFrameColumnType {
	/// The short name of the storage type, as recorded in schema snapshots.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Unknown => "unknown",
			Self::Number => "number",
			Self::Integer => "integer",
			Self::Boolean => "boolean",
			Self::Enum { .. } => "enum",
			Self::Datetime => "datetime",
			Self::Text => "text",
		}
	}
}

impl DataFrame {
	pub fn new(column_names: Vec<String>, column_types: Vec<DataFrameColumnType>) -> Self {
		let columns = column_names
			.into_iter()
			.zip(column_types.into_iter())
			.map(|(name, column_type)| match column_type {
				DataFrameColumnType::Unknown => {
					DataFrameColumn::Unknown(UnknownColumn { name, len: 0 })
				}
				DataFrameColumnType::Number => DataFrameColumn::Number(NumberColumn {
					name,
					data: Vec::new(),
				}),
				DataFrameColumnType::Integer => DataFrameColumn::Integer(IntegerColumn {
					name,
					data: Vec::new(),
				}),
				DataFrameColumnType::Boolean => DataFrameColumn::Boolean(BooleanColumn {
					name,
					data: Vec::new(),
				}),
				DataFrameColumnType::Enum { options } => DataFrameColumn::Enum(EnumColumn {
					name,
					options,
					data: Vec::new(),
				}),
				DataFrameColumnType::Datetime => DataFrameColumn::Datetime(DatetimeColumn {
					name,
					data: Vec::new(),
				}),
				DataFrameColumnType::Text => DataFrameColumn::Text(TextColumn {
					name,
					data: Vec::new(),
				}),
			})
			.collect();
		Self { columns }
	}

	pub fn from_columns(columns: Vec<DataFrameColumn>) -> Self {
		Self { columns }
	}

	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn view(&self) -> DataFrameView {
		let columns = self.columns.iter().map(|column| column.view()).collect();
		DataFrameView { columns }
	}

	pub fn column(&self, name: &str) -> Option<&DataFrameColumn> {
		self.columns.iter().find(|column| column.name() == name)
	}

	pub fn column_names(&self) -> Vec<String> {
		self.columns
			.iter()
			.map(|column| column.name().to_owned())
			.collect()
	}
}

impl DataFrameColumn {
	pub fn len(&self) -> usize {
		self.view().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Unknown(column) => &column.name,
			Self::Number(column) => &column.name,
			Self::Integer(column) => &column.name,
			Self::Boolean(column) => &column.name,
			Self::Enum(column) => &column.name,
			Self::Datetime(column) => &column.name,
			Self::Text(column) => &column.name,
		}
	}

	pub fn column_type(&self) -> DataFrameColumnType {
		self.view().column_type()
	}

	pub fn view(&self) -> DataFrameColumnView {
		match self {
			Self::Unknown(column) => DataFrameColumnView::Unknown(UnknownColumnView {
				name: &column.name,
				len: column.len,
			}),
			Self::Number(column) => DataFrameColumnView::Number(NumberColumnView {
				name: &column.name,
				data: &column.data,
			}),
			Self::Integer(column) => DataFrameColumnView::Integer(IntegerColumnView {
				name: &column.name,
				data: &column.data,
			}),
			Self::Boolean(column) => DataFrameColumnView::Boolean(BooleanColumnView {
				name: &column.name,
				data: &column.data,
			}),
			Self::Enum(column) => DataFrameColumnView::Enum(EnumColumnView {
				name: &column.name,
				options: &column.options,
				data: &column.data,
			}),
			Self::Datetime(column) => DataFrameColumnView::Datetime(DatetimeColumnView {
				name: &column.name,
				data: &column.data,
			}),
			Self::Text(column) => DataFrameColumnView::Text(TextColumnView {
				name: &column.name,
				data: &column.data,
			}),
		}
	}
}

impl<'a> DataFrameView<'a> {
	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn view(&self) -> Self {
		self.clone()
	}

	pub fn column(&self, name: &str) -> Option<&DataFrameColumnView<'a>> {
		self.columns.iter().find(|column| column.name() == name)
	}

	pub fn column_names(&self) -> Vec<String> {
		self.columns
			.iter()
			.map(|column| column.name().to_owned())
			.collect()
	}

	/// Select the columns named `names`, in the order given. Returns `None` if any of the names is not a column of this dataframe.
	pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Option<Self> {
		let columns = names
			.iter()
			.map(|name| self.column(name.as_ref()).cloned())
			.collect::<Option<Vec<_>>>()?;
		Some(Self { columns })
	}

	/// Copy the rows at `indexes`, in the order given, into a new dataframe. Indexes may repeat.
	pub fn take_rows(&self, indexes: &[usize]) -> DataFrame {
		let columns = self
			.columns
			.iter()
			.map(|column| column.take_rows(indexes))
			.collect();
		DataFrame { columns }
	}

	pub fn to_owned(&self) -> DataFrame {
		let columns = self.columns.iter().map(|column| column.to_owned()).collect();
		DataFrame { columns }
	}
}

impl<'a> DataFrameColumnView<'a> {
	pub fn len(&self) -> usize {
		match self {
			Self::Unknown(column) => column.len,
			Self::Number(column) => column.data.len(),
			Self::Integer(column) => column.data.len(),
			Self::Boolean(column) => column.data.len(),
			Self::Enum(column) => column.data.len(),
			Self::Datetime(column) => column.data.len(),
			Self::Text(column) => column.data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn name(&self) -> &'a str {
		match self {
			Self::Unknown(column) => column.name,
			Self::Number(column) => column.name,
			Self::Integer(column) => column.name,
			Self::Boolean(column) => column.name,
			Self::Enum(column) => column.name,
			Self::Datetime(column) => column.name,
			Self::Text(column) => column.name,
		}
	}

	pub fn column_type(&self) -> DataFrameColumnType {
		match self {
			Self::Unknown(_) => DataFrameColumnType::Unknown,
			Self::Number(_) => DataFrameColumnType::Number,
			Self::Integer(_) => DataFrameColumnType::Integer,
			Self::Boolean(_) => DataFrameColumnType::Boolean,
			Self::Enum(column) => DataFrameColumnType::Enum {
				options: column.options.to_owned(),
			},
			Self::Datetime(_) => DataFrameColumnType::Datetime,
			Self::Text(_) => DataFrameColumnType::Text,
		}
	}

	pub fn is_missing(&self, index: usize) -> bool {
		match self {
			Self::Unknown(_) => true,
			Self::Number(column) => column.data[index].is_nan(),
			Self::Integer(column) => column.data[index].is_none(),
			Self::Boolean(column) => column.data[index].is_none(),
			Self::Enum(column) => column.data[index].is_none(),
			Self::Datetime(column) => column.data[index].is_none(),
			Self::Text(column) => column.data[index].is_none(),
		}
	}

	pub fn n_missing(&self) -> usize {
		(0..self.len()).filter(|index| self.is_missing(*index)).count()
	}

	/// Render the value at `index` as a string, the way it would appear in a csv. Returns `None` for missing values.
	pub fn value_to_string(&self, index: usize) -> Option<String> {
		match self {
			Self::Unknown(_) => None,
			Self::Number(column) => {
				let value = column.data[index];
				if value.is_nan() {
					None
				} else {
					Some(value.to_string())
				}
			}
			Self::Integer(column) => column.data[index].map(|value| value.to_string()),
			Self::Boolean(column) => column.data[index].map(|value| {
				if value {
					"True".to_owned()
				} else {
					"False".to_owned()
				}
			}),
			Self::Enum(column) => column.value(index).map(|value| value.to_owned()),
			Self::Datetime(column) => column.data[index].map(|value| value.to_string()),
			Self::Text(column) => column.data[index].clone(),
		}
	}

	pub fn as_number(&self) -> Option<&NumberColumnView<'a>> {
		match self {
			Self::Number(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_enum(&self) -> Option<&EnumColumnView<'a>> {
		match self {
			Self::Enum(column) => Some(column),
			_ => None,
		}
	}

	pub fn take_rows(&self, indexes: &[usize]) -> DataFrameColumn {
		let name = self.name().to_owned();
		match self {
			Self::Unknown(_) => DataFrameColumn::Unknown(UnknownColumn {
				name,
				len: indexes.len(),
			}),
			Self::Number(column) => DataFrameColumn::Number(NumberColumn {
				name,
				data: indexes.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Integer(column) => DataFrameColumn::Integer(IntegerColumn {
				name,
				data: indexes.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Boolean(column) => DataFrameColumn::Boolean(BooleanColumn {
				name,
				data: indexes.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Enum(column) => DataFrameColumn::Enum(EnumColumn {
				name,
				options: column.options.to_owned(),
				data: indexes.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Datetime(column) => DataFrameColumn::Datetime(DatetimeColumn {
				name,
				data: indexes.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Text(column) => DataFrameColumn::Text(TextColumn {
				name,
				data: indexes.iter().map(|index| column.data[*index].clone()).collect(),
			}),
		}
	}

	pub fn to_owned(&self) -> DataFrameColumn {
		let indexes: Vec<usize> = (0..self.len()).collect();
		self.take_rows(&indexes)
	}
}

impl<'a> EnumColumnView<'a> {
	/// Look up the option string for the value at `index`.
	pub fn value(&self, index: usize) -> Option<&'a str> {
		self.data[index].and_then(|value| {
			self.options
				.get(value.get() - 1)
				.map(|option| option.as_str())
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn dataframe() -> DataFrame {
		DataFrame::from_columns(vec![
			DataFrameColumn::Number(NumberColumn {
				name: "height".to_owned(),
				data: vec![1.5, f32::NAN, 2.5],
			}),
			DataFrameColumn::Enum(EnumColumn {
				name: "color".to_owned(),
				options: vec!["blue".to_owned(), "red".to_owned()],
				data: vec![NonZeroUsize::new(2), None, NonZeroUsize::new(1)],
			}),
			DataFrameColumn::Boolean(BooleanColumn {
				name: "active".to_owned(),
				data: vec![Some(true), Some(false), None],
			}),
		])
	}

	#[test]
	fn test_select_and_take_rows() {
		let dataframe = dataframe();
		let view = dataframe.view();
		assert_eq!(view.nrows(), 3);
		let selected = view.select(&["active", "color"]).unwrap();
		assert_eq!(selected.column_names(), vec!["active", "color"]);
		assert!(view.select(&["missing"]).is_none());
		let taken = selected.take_rows(&[2, 0, 0]);
		assert_eq!(taken.nrows(), 3);
		let color = taken.view().column("color").unwrap().clone();
		assert_eq!(color.value_to_string(0).as_deref(), Some("blue"));
		assert_eq!(color.value_to_string(1).as_deref(), Some("red"));
	}

	#[test]
	fn test_missing_values() {
		let dataframe = dataframe();
		let view = dataframe.view();
		let counts: Vec<usize> = view.columns.iter().map(|column| column.n_missing()).collect();
		assert_eq!(counts, vec![1, 1, 1]);
		let active = view.column("active").unwrap();
		assert_eq!(active.value_to_string(0).as_deref(), Some("True"));
		assert_eq!(active.value_to_string(2), None);
	}
}
