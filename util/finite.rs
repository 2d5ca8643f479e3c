use num_traits::Float;
use std::{
	cmp::{Ord, Ordering},
	fmt::Debug,
	hash::{Hash, Hasher},
};
use thiserror::Error;

/// A `Finite` wraps a float that is known to be neither NaN nor infinite, which makes it safe to use as a key in ordered and hashed collections.
#[derive(Clone, Copy, Debug)]
pub struct Finite<T>(T)
where
	T: Float;

#[derive(Debug, Error)]
#[error("not finite")]
pub struct NotFiniteError;

impl<T> Finite<T>
where
	T: Float,
{
	pub fn new(value: T) -> Result<Self, NotFiniteError> {
		if value.is_finite() {
			Ok(Self(value))
		} else {
			Err(NotFiniteError)
		}
	}

	pub fn get(self) -> T {
		self.0
	}
}

impl<T> std::ops::Deref for Finite<T>
where
	T: Float,
{
	type Target = T;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<T> std::fmt::Display for Finite<T>
where
	T: Float + std::fmt::Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl<T> PartialEq for Finite<T>
where
	T: Float,
{
	fn eq(&self, other: &Self) -> bool {
		self.0.eq(&other.0)
	}
}

impl<T> Eq for Finite<T> where T: Float {}

impl<T> PartialOrd for Finite<T>
where
	T: Float,
{
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T> Ord for Finite<T>
where
	T: Float,
{
	fn cmp(&self, other: &Self) -> Ordering {
		// Both values are finite, so the comparison is total.
		self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
	}
}

impl Hash for Finite<f32> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		// -0.0 and 0.0 compare equal, so they must hash equal.
		let value = if self.0 == 0.0 { 0.0f32 } else { self.0 };
		value.to_bits().hash(state);
	}
}

impl Hash for Finite<f64> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		let value = if self.0 == 0.0 { 0.0f64 } else { self.0 };
		value.to_bits().hash(state);
	}
}

pub trait ToFinite<T>
where
	T: Float,
{
	/// If the value is finite, return `Ok(Finite(self))`, otherwise return an error.
	fn to_finite(self) -> Result<Finite<T>, NotFiniteError>;
}

impl<T> ToFinite<T> for T
where
	T: Float,
{
	fn to_finite(self) -> Result<Finite<T>, NotFiniteError> {
		Finite::new(self)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::collections::{BTreeSet, HashSet};

	#[test]
	fn test_rejects_non_finite() {
		assert!(Finite::new(f32::NAN).is_err());
		assert!(Finite::new(f64::INFINITY).is_err());
		assert!(1.5f32.to_finite().is_ok());
	}

	#[test]
	fn test_ordering_and_hashing() {
		let values: BTreeSet<Finite<f64>> = [3.0, -1.0, 2.0, -1.0]
			.iter()
			.map(|value| Finite::new(*value).unwrap())
			.collect();
		let values: Vec<f64> = values.into_iter().map(|value| value.get()).collect();
		assert_eq!(values, vec![-1.0, 2.0, 3.0]);
		let zeros: HashSet<Finite<f32>> = [0.0f32, -0.0f32]
			.iter()
			.map(|value| Finite::new(*value).unwrap())
			.collect();
		assert_eq!(zeros.len(), 1);
	}
}
