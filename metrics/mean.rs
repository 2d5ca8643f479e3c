use super::StreamingMetric;

/// The arithmetic mean of a stream of values.
#[derive(Debug, Clone, Default)]
pub struct Mean {
	n: u64,
	mean: f64,
}

impl StreamingMetric<'_> for Mean {
	type Input = f64;
	type Output = Option<f64>;

	fn update(&mut self, value: f64) {
		self.n += 1;
		self.mean += (value - self.mean) / self.n as f64;
	}

	fn merge(&mut self, other: Self) {
		let n = self.n + other.n;
		if n == 0 {
			return;
		}
		let n_a = self.n as f64;
		let n_b = other.n as f64;
		self.mean = (n_a * self.mean + n_b * other.mean) / (n_a + n_b);
		self.n = n;
	}

	fn finalize(self) -> Self::Output {
		if self.n > 0 {
			Some(self.mean)
		} else {
			None
		}
	}
}

#[test]
fn test_mean() {
	let mut a = Mean::default();
	a.update(1.0);
	a.update(2.0);
	let mut b = Mean::default();
	b.update(6.0);
	a.merge(b);
	a.merge(Mean::default());
	assert_eq!(a.finalize(), Some(3.0));
	assert_eq!(Mean::default().finalize(), None);
}
