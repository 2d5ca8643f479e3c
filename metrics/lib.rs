/*!
This crate defines the [`Metric`](trait.Metric.html) and [`StreamingMetric`](trait.StreamingMetric.html) traits and a number of concrete types that implement them, such as [`ClassificationMetrics`](struct.ClassificationMetrics.html) and [`RegressionMetrics`](struct.RegressionMetrics.html).

All metrics accumulate in `f64` so that results are stable when they are rounded for serialization.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod classification;
mod cross_entropy;
mod mean;
mod mean_variance;
mod mode;
mod regression;

pub use self::classification::{ClassMetrics, ClassificationMetrics, ClassificationMetricsOutput};
pub use self::cross_entropy::{CrossEntropy, CrossEntropyInput};
pub use self::mean::Mean;
pub use self::mean_variance::{m2_to_variance, merge_mean_m2, MeanVariance};
pub use self::mode::Mode;
pub use self::regression::{RegressionMetrics, RegressionMetricsOutput};

/**
The `Metric` trait defines a common interface to metrics that are computed when the entire input is available at once.

The generic lifetime `'a` allows `Input`s to borrow from their enclosing scope.
*/
pub trait Metric<'a> {
	type Input;
	type Output;
	fn compute(input: Self::Input) -> Self::Output;
}

/**
The `StreamingMetric` trait defines a common interface to metrics that are computed in a streaming manner, where the input is available in chunks.

After being initialized, a value of a type implementing `StreamingMetric` can have `update()` called on it with values of the associated type `Input`. Multiple values can be merged together by calling `merge()`, which is how a metric is computed across multiple threads. When finished aggregating, call `finalize()` to produce the associated type `Output`.

# Examples

Here is a `Min` metric, which takes `f32`s as input and produces the minimum of all the inputs.

```
use kitsune_metrics::StreamingMetric;

struct Min(f32);

impl StreamingMetric<'_> for Min {
	type Input = f32;
	type Output = f32;
	fn update(&mut self, input: Self::Input) {
		self.0 = self.0.min(input)
	}
	fn merge(&mut self, other: Self) { self.0 = self.0.min(other.0) }
	fn finalize(self) -> Self::Output { self.0 }
}
```
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}
