use super::Metric;
use std::collections::BTreeMap;

/// The most frequent value. Ties are broken in favor of the smallest value.
#[derive(Debug, Clone, Default)]
pub struct Mode;

impl<'a> Metric<'a> for Mode {
	type Input = &'a [usize];
	type Output = Option<usize>;

	fn compute(input: Self::Input) -> Self::Output {
		let mut histogram = BTreeMap::new();
		for value in input.iter() {
			*histogram.entry(*value).or_insert(0usize) += 1;
		}
		let mut mode: Option<(usize, usize)> = None;
		for (value, count) in histogram.into_iter() {
			match mode {
				Some((_, mode_count)) if mode_count >= count => {}
				_ => mode = Some((value, count)),
			}
		}
		mode.map(|(value, _)| value)
	}
}

#[test]
fn test_mode() {
	assert_eq!(Mode::compute(&[3, 1, 3, 1, 2]), Some(1));
	assert_eq!(Mode::compute(&[0, 1, 1]), Some(1));
	assert_eq!(Mode::compute(&[]), None);
}
