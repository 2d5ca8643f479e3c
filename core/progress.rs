/// The stages of a training run, reported through the `update_progress` callback of [`train`](../train/fn.train.html).
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
	Loading,
	Profiling,
	Selecting,
	Fitting { preset: String },
	Evaluating,
	CrossValidating { n_folds: usize },
	Explaining,
	Saving,
}

impl std::fmt::Display for Progress {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Loading => write!(f, "loading the dataset"),
			Self::Profiling => write!(f, "profiling the dataset"),
			Self::Selecting => write!(f, "selecting features"),
			Self::Fitting { preset } => write!(f, "fitting the {} preset", preset),
			Self::Evaluating => write!(f, "computing holdout metrics"),
			Self::CrossValidating { n_folds } => write!(f, "cross validating with {} folds", n_folds),
			Self::Explaining => write!(f, "explaining the model"),
			Self::Saving => write!(f, "saving the model"),
		}
	}
}
