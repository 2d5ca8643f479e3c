use anyhow::Result;
use kitsune_dataframe::DataFrame;
use std::path::Path;

/// Write `dataframe` as a csv file with a header row. Missing values are written as empty fields.
pub fn write_csv(dataframe: &DataFrame, path: &Path) -> Result<()> {
	let mut writer = csv::Writer::from_path(path)?;
	writer.write_record(dataframe.column_names())?;
	let view = dataframe.view();
	for row in 0..dataframe.nrows() {
		let record = view
			.columns
			.iter()
			.map(|column| column.value_to_string(row).unwrap_or_default());
		writer.write_record(record)?;
	}
	writer.flush()?;
	Ok(())
}
