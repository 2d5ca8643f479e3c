use kitsune_features::FeaturesError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The broad category of an [`Error`](enum.Error.html). Callers use it to decide whether a failure is the user's input, the configuration, the model fitting, or the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	Configuration,
	Modeling,
	Io,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("data source \"{uri}\" is unavailable: {message}")]
	DataSourceUnavailable { uri: String, message: String },
	#[error("invalid csv: {0}")]
	InvalidCsv(String),
	#[error("target column \"{0}\" was not found among the selected columns")]
	TargetNotFound(String),
	#[error("target column \"{0}\" cannot be excluded")]
	TargetExcluded(String),
	#[error("target column \"{0}\" has no values")]
	EmptyTarget(String),
	#[error("a dataset profile is required to select features with the default exclusions")]
	ProfileMissing,
	#[error("invalid target: {0}")]
	InvalidTarget(String),
	#[error("length mismatch: expected {expected}, got {actual}")]
	LengthMismatch { expected: usize, actual: usize },
	#[error("schema mismatch: {0}")]
	SchemaMismatch(String),
	#[error("invalid input: {0}")]
	InvalidInput(String),
	#[error("no preset named \"{name}\" for task {task}")]
	PresetNotFound { task: String, name: String },
	#[error("preset \"{name}\" is malformed: {message}")]
	MalformedPreset { name: String, message: String },
	#[error("feature mismatch: {0}")]
	FeatureMismatch(String),
	#[error("invalid config: {0}")]
	InvalidConfig(String),
	#[error("every automl candidate failed: {0}")]
	AllCandidatesFailed(String),
	#[error("failed to fit {estimator}: {message}")]
	Fit { estimator: String, message: String },
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("serialization failed: {0}")]
	Serialization(String),
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::DataSourceUnavailable { .. }
			| Self::InvalidCsv(_)
			| Self::TargetNotFound(_)
			| Self::TargetExcluded(_)
			| Self::EmptyTarget(_)
			| Self::ProfileMissing
			| Self::InvalidTarget(_)
			| Self::LengthMismatch { .. }
			| Self::SchemaMismatch(_)
			| Self::InvalidInput(_) => ErrorKind::Validation,
			Self::PresetNotFound { .. }
			| Self::MalformedPreset { .. }
			| Self::FeatureMismatch(_)
			| Self::InvalidConfig(_) => ErrorKind::Configuration,
			Self::AllCandidatesFailed(_) | Self::Fit { .. } => ErrorKind::Modeling,
			Self::Io(_) | Self::Serialization(_) => ErrorKind::Io,
		}
	}

	pub(crate) fn fit(estimator: &str, error: impl std::fmt::Display) -> Self {
		Self::Fit {
			estimator: estimator.to_owned(),
			message: error.to_string(),
		}
	}
}

impl From<FeaturesError> for Error {
	fn from(error: FeaturesError) -> Self {
		match error {
			FeaturesError::ColumnNotFound(_) => Self::SchemaMismatch(error.to_string()),
			FeaturesError::UnsupportedColumnType { .. } => Self::InvalidInput(error.to_string()),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(error: serde_json::Error) -> Self {
		Self::Serialization(error.to_string())
	}
}

impl From<rmp_serde::encode::Error> for Error {
	fn from(error: rmp_serde::encode::Error) -> Self {
		Self::Serialization(error.to_string())
	}
}

impl From<rmp_serde::decode::Error> for Error {
	fn from(error: rmp_serde::decode::Error) -> Self {
		Self::Serialization(error.to_string())
	}
}

#[test]
fn test_error_kinds() {
	assert_eq!(Error::ProfileMissing.kind(), ErrorKind::Validation);
	let error = Error::PresetNotFound {
		task: "regression".to_owned(),
		name: "nope".to_owned(),
	};
	assert_eq!(error.kind(), ErrorKind::Configuration);
	assert_eq!(
		error.to_string(),
		"no preset named \"nope\" for task regression"
	);
	assert_eq!(
		Error::from(FeaturesError::ColumnNotFound("age".to_owned())).kind(),
		ErrorKind::Validation
	);
}
