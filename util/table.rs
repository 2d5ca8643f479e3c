/// A `Table` renders rows of strings as a plain text table with a header, which the cli uses to print profiles and model comparisons.
pub struct Table {
	padding: usize,
	header: Vec<String>,
	rows: Vec<Vec<String>>,
}

impl Table {
	pub fn new(header: Vec<String>) -> Self {
		Self {
			padding: 1,
			header,
			rows: Vec::new(),
		}
	}

	pub fn push_row(&mut self, row: Vec<String>) {
		self.rows.push(row);
	}

	fn column_widths(&self) -> Vec<usize> {
		let mut column_widths: Vec<usize> =
			self.header.iter().map(|header| header.chars().count()).collect();
		for row in self.rows.iter() {
			for (column_width, value) in column_widths.iter_mut().zip(row.iter()) {
				*column_width = usize::max(*column_width, value.chars().count());
			}
		}
		column_widths
	}
}

impl std::fmt::Display for Table {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let column_widths = self.column_widths();
		write_row(f, &column_widths, self.padding, &self.header)?;
		write_line(f, &column_widths, self.padding)?;
		for row in self.rows.iter() {
			write_row(f, &column_widths, self.padding, row)?;
		}
		Ok(())
	}
}

fn write_line(
	f: &mut std::fmt::Formatter<'_>,
	column_widths: &[usize],
	padding: usize,
) -> std::fmt::Result {
	write!(f, "|")?;
	for column_width in column_widths.iter() {
		write!(f, "{}|", "-".repeat(column_width + 2 * padding))?;
	}
	writeln!(f)
}

fn write_row(
	f: &mut std::fmt::Formatter<'_>,
	column_widths: &[usize],
	padding: usize,
	values: &[String],
) -> std::fmt::Result {
	write!(f, "|")?;
	for (index, column_width) in column_widths.iter().enumerate() {
		let value = values.get(index).map(|value| value.as_str()).unwrap_or("");
		let fill = column_width + padding - value.chars().count();
		write!(f, "{}{}{}|", " ".repeat(padding), value, " ".repeat(fill))?;
	}
	writeln!(f)
}

#[test]
fn test_table() {
	let mut table = Table::new(vec!["model".to_owned(), "score".to_owned()]);
	table.push_row(vec!["random_forest".to_owned(), "0.91".to_owned()]);
	table.push_row(vec!["ridge".to_owned(), "0.8".to_owned()]);
	let expected = "\
| model         | score |
|---------------|-------|
| random_forest | 0.91  |
| ridge         | 0.8   |
";
	assert_eq!(table.to_string(), expected);
}
