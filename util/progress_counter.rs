use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/// A `ProgressCounter` is a cheaply cloneable counter that many threads can increment while a long running computation, such as training the trees of a forest or fitting the folds of a cross validation, is in progress.
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	/// Increment the counter by `amount` and return the new value.
	pub fn inc(&self, amount: u64) -> u64 {
		self.current.fetch_add(amount, Ordering::Relaxed) + amount
	}

	pub fn is_done(&self) -> bool {
		self.get() >= self.total
	}
}

#[test]
fn test_progress_counter() {
	let counter = ProgressCounter::new(3);
	let clone = counter.clone();
	assert_eq!(clone.inc(2), 2);
	assert!(!counter.is_done());
	counter.inc(1);
	assert_eq!(clone.get(), 3);
	assert!(clone.is_done());
}
