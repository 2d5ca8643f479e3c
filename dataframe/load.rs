use super::*;
use anyhow::{format_err, Context, Result};
use chrono::NaiveDate;
use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	io::Cursor,
	path::Path,
};

#[derive(Clone)]
pub struct FromCsvOptions<'a> {
	pub column_types: Option<BTreeMap<String, DataFrameColumnType>>,
	pub infer_options: InferOptions,
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for FromCsvOptions<'a> {
	fn default() -> Self {
		Self {
			column_types: None,
			infer_options: InferOptions::default(),
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

#[derive(Clone, Debug)]
pub struct InferOptions {
	/// If false, columns of dates are loaded as enum columns.
	pub infer_datetimes: bool,
}

impl Default for InferOptions {
	fn default() -> Self {
		Self {
			infer_datetimes: true,
		}
	}
}

/// These values are the default values that are considered missing.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
	"<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATETIME_FORMATS: &[&str] = &[
	"%Y-%m-%d %H:%M:%S",
	"%Y-%m-%dT%H:%M:%S",
	"%Y-%m-%d %H:%M:%S%.f",
	"%Y-%m-%dT%H:%M:%S%.f",
	"%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

impl DataFrame {
	pub fn from_path(path: &Path, options: FromCsvOptions) -> Result<Self> {
		let mut reader = csv::Reader::from_path(path)
			.with_context(|| format!("failed to open csv file {}", path.display()))?;
		Self::from_csv(&mut reader, options)
	}

	pub fn from_bytes(bytes: &[u8], options: FromCsvOptions) -> Result<Self> {
		Self::from_csv(&mut csv::Reader::from_reader(Cursor::new(bytes)), options)
	}

	pub fn from_csv<R>(reader: &mut csv::Reader<R>, options: FromCsvOptions) -> Result<Self>
	where
		R: std::io::Read + std::io::Seek,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.to_owned())
			.collect();
		let start_position = reader.position().clone();
		let invalid_values = options.invalid_values;

		// Retrieve any column types present in the options. The remaining columns need to be inferred.
		let mut column_types: Vec<Option<DataFrameColumnType>> = column_names
			.iter()
			.map(|column_name| {
				options
					.column_types
					.as_ref()
					.and_then(|column_types| column_types.get(column_name))
					.cloned()
			})
			.collect();

		// Passing over the csv to infer column types is only necessary if one or more columns did not have its type specified.
		let needs_infer = column_types.iter().any(|column_type| column_type.is_none());
		if needs_infer {
			let mut infer_stats: Vec<(usize, InferStats)> = column_types
				.iter()
				.enumerate()
				.filter(|(_, column_type)| column_type.is_none())
				.map(|(index, _)| (index, InferStats::new(&options.infer_options)))
				.collect();
			let mut record = csv::StringRecord::new();
			while reader.read_record(&mut record)? {
				for (index, infer_stats) in infer_stats.iter_mut() {
					let value = record
						.get(*index)
						.ok_or_else(|| format_err!("csv record is missing column {}", index))?;
					if !invalid_values.contains(&value) {
						infer_stats.update(value);
					}
				}
			}
			for (index, infer_stats) in infer_stats.into_iter() {
				column_types[index] = Some(infer_stats.finalize());
			}
			// After inference, return to the beginning of the csv to load the values.
			reader.seek(start_position)?;
		}
		let column_types: Vec<DataFrameColumnType> = column_types
			.into_iter()
			.map(|column_type| column_type.unwrap_or(DataFrameColumnType::Unknown))
			.collect();

		let mut dataframe = Self::new(column_names, column_types);
		let enum_option_indexes: Vec<Option<HashMap<String, NonZeroUsize>>> = dataframe
			.columns
			.iter()
			.map(|column| match column {
				DataFrameColumn::Enum(column) => Some(
					column
						.options
						.iter()
						.enumerate()
						.filter_map(|(index, option)| {
							NonZeroUsize::new(index + 1).map(|value| (option.clone(), value))
						})
						.collect(),
				),
				_ => None,
			})
			.collect();

		// Read each csv record and insert the values into the columns of the dataframe.
		let mut record = csv::StringRecord::new();
		while reader.read_record(&mut record)? {
			for ((column, option_indexes), value) in dataframe
				.columns
				.iter_mut()
				.zip(enum_option_indexes.iter())
				.zip(record.iter())
			{
				let value = if invalid_values.contains(&value) {
					None
				} else {
					Some(value)
				};
				match column {
					DataFrameColumn::Unknown(column) => column.len += 1,
					DataFrameColumn::Number(column) => {
						let value = value.and_then(parse_number).unwrap_or(f32::NAN);
						column.data.push(value);
					}
					DataFrameColumn::Integer(column) => {
						column.data.push(value.and_then(parse_integer));
					}
					DataFrameColumn::Boolean(column) => {
						column.data.push(value.and_then(parse_boolean));
					}
					DataFrameColumn::Enum(column) => {
						let value = value.and_then(|value| {
							option_indexes
								.as_ref()
								.and_then(|option_indexes| option_indexes.get(value).copied())
						});
						column.data.push(value);
					}
					DataFrameColumn::Datetime(column) => {
						column.data.push(value.and_then(parse_datetime));
					}
					DataFrameColumn::Text(column) => {
						column.data.push(value.map(|value| value.to_owned()));
					}
				}
			}
		}
		Ok(dataframe)
	}
}

fn parse_number(value: &str) -> Option<f32> {
	lexical::parse::<f64, _>(value)
		.ok()
		.filter(|value| value.is_finite())
		.map(|value| value as f32)
}

fn parse_integer(value: &str) -> Option<i64> {
	lexical::parse::<i64, _>(value).ok()
}

fn parse_boolean(value: &str) -> Option<bool> {
	match value {
		"true" | "True" | "TRUE" => Some(true),
		"false" | "False" | "FALSE" => Some(false),
		_ => None,
	}
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
	DATETIME_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
		.or_else(|| {
			DATE_FORMATS
				.iter()
				.find_map(|format| NaiveDate::parse_from_str(value, format).ok())
				.and_then(|date| date.and_hms_opt(0, 0, 0))
		})
}

/// `InferStats` tracks which storage types remain possible for a column as its values are seen. The most specific type still possible when the column is finalized wins, in the order boolean, integer, number, datetime, enum.
#[derive(Clone, Debug)]
pub struct InferStats {
	n_values: usize,
	could_be_boolean: bool,
	could_be_integer: bool,
	could_be_number: bool,
	could_be_datetime: bool,
	unique_values: BTreeSet<String>,
}

impl InferStats {
	pub fn new(infer_options: &InferOptions) -> Self {
		Self {
			n_values: 0,
			could_be_boolean: true,
			could_be_integer: true,
			could_be_number: true,
			could_be_datetime: infer_options.infer_datetimes,
			unique_values: BTreeSet::new(),
		}
	}

	/// Update the stats with a value that is not missing.
	pub fn update(&mut self, value: &str) {
		self.n_values += 1;
		if !self.unique_values.contains(value) {
			self.unique_values.insert(value.to_owned());
		}
		if self.could_be_boolean && parse_boolean(value).is_none() {
			self.could_be_boolean = false;
		}
		if self.could_be_integer && parse_integer(value).is_none() {
			self.could_be_integer = false;
		}
		if self.could_be_number && parse_number(value).is_none() {
			self.could_be_number = false;
		}
		if self.could_be_datetime && parse_datetime(value).is_none() {
			self.could_be_datetime = false;
		}
	}

	pub fn finalize(self) -> DataFrameColumnType {
		if self.n_values == 0 {
			DataFrameColumnType::Unknown
		} else if self.could_be_boolean {
			DataFrameColumnType::Boolean
		} else if self.could_be_integer {
			DataFrameColumnType::Integer
		} else if self.could_be_number {
			DataFrameColumnType::Number
		} else if self.could_be_datetime {
			DataFrameColumnType::Datetime
		} else {
			DataFrameColumnType::Enum {
				options: self.unique_values.into_iter().collect(),
			}
		}
	}
}

#[test]
fn test_infer() {
	let csv = r#"number,enum,integer,flag
1.5,test,1,true
2,test,2,False
"#;
	let df = DataFrame::from_bytes(csv.as_bytes(), FromCsvOptions::default()).unwrap();
	insta::assert_debug_snapshot!(df, @r###"
 DataFrame {
     columns: [
         Number(
             NumberColumn {
                 name: "number",
                 data: [
                     1.5,
                     2.0,
                 ],
             },
         ),
         Enum(
             EnumColumn {
                 name: "enum",
                 options: [
                     "test",
                 ],
                 data: [
                     Some(
                         1,
                     ),
                     Some(
                         1,
                     ),
                 ],
             },
         ),
         Integer(
             IntegerColumn {
                 name: "integer",
                 data: [
                     Some(
                         1,
                     ),
                     Some(
                         2,
                     ),
                 ],
             },
         ),
         Boolean(
             BooleanColumn {
                 name: "flag",
                 data: [
                     Some(
                         true,
                     ),
                     Some(
                         false,
                     ),
                 ],
             },
         ),
     ],
 }
 "###);
}

#[test]
fn test_column_types() {
	let csv = r#"number,text,enum
1,test,hello
2,,world
"#;
	let mut column_types = BTreeMap::new();
	column_types.insert("text".to_owned(), DataFrameColumnType::Text);
	column_types.insert(
		"enum".to_owned(),
		DataFrameColumnType::Enum {
			options: vec!["hello".to_owned()],
		},
	);
	let df = DataFrame::from_bytes(
		csv.as_bytes(),
		FromCsvOptions {
			column_types: Some(column_types),
			..Default::default()
		},
	)
	.unwrap();
	assert_eq!(df.columns[0].column_type(), DataFrameColumnType::Integer);
	match &df.columns[1] {
		DataFrameColumn::Text(column) => {
			assert_eq!(column.data, vec![Some("test".to_owned()), None]);
		}
		_ => panic!("expected a text column"),
	}
	match &df.columns[2] {
		// Values that are not among the specified options are missing.
		DataFrameColumn::Enum(column) => assert_eq!(column.data, vec![NonZeroUsize::new(1), None]),
		_ => panic!("expected an enum column"),
	}
}

#[test]
fn test_missing_and_datetimes() {
	let csv = r#"empty,when,mixed
,2021-03-04,1
NA,2021-03-05 10:30:00,x
"#;
	let df = DataFrame::from_bytes(csv.as_bytes(), FromCsvOptions::default()).unwrap();
	assert_eq!(df.nrows(), 2);
	assert_eq!(df.columns[0].column_type(), DataFrameColumnType::Unknown);
	assert_eq!(df.columns[1].column_type(), DataFrameColumnType::Datetime);
	assert_eq!(
		df.columns[2].column_type(),
		DataFrameColumnType::Enum {
			options: vec!["1".to_owned(), "x".to_owned()]
		}
	);
}
