/*!
The narrow interfaces through which training and prediction reach the outside world: a [`DataSource`](trait.DataSource.html) that reads datasets by URI, a [`MetadataStore`](trait.MetadataStore.html) for training run metadata, and an [`ArtifactStore`](trait.ArtifactStore.html) for serialized models. Each has a filesystem implementation.
*/

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait DataSource {
	fn read(&self, uri: &str) -> Result<Vec<u8>>;
}

pub trait MetadataStore {
	fn read(&self, id: &str) -> Result<serde_json::Value>;
	fn write(&self, id: &str, metadata: &serde_json::Value) -> Result<()>;
}

pub trait ArtifactStore {
	fn read(&self, uri: &str) -> Result<Vec<u8>>;
	fn write(&self, uri: &str, bytes: &[u8]) -> Result<()>;
}

/// The stores a training run writes to and a prediction reads from.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
	pub data_source: &'a dyn DataSource,
	pub metadata: &'a dyn MetadataStore,
	pub artifacts: &'a dyn ArtifactStore,
}

/// The artifact URI of a trained model, relative to the artifact store.
pub fn model_uri(problem_id: &str, model_id: &str) -> String {
	format!("{}/{}/model.msgpack", problem_id, model_id)
}

/// Reads URIs as paths, relative to `root` if one is set.
#[derive(Debug, Clone, Default)]
pub struct FsDataSource {
	pub root: Option<PathBuf>,
}

impl DataSource for FsDataSource {
	fn read(&self, uri: &str) -> Result<Vec<u8>> {
		let path = match self.root.as_ref() {
			Some(root) => root.join(uri),
			None => PathBuf::from(uri),
		};
		std::fs::read(&path).map_err(|error| Error::DataSourceUnavailable {
			uri: uri.to_owned(),
			message: error.to_string(),
		})
	}
}

/// Stores each record as pretty printed JSON in `<root>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FsMetadataStore {
	root: PathBuf,
}

impl FsMetadataStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn path(&self, id: &str) -> PathBuf {
		self.root.join(format!("{}.json", id))
	}
}

impl MetadataStore for FsMetadataStore {
	fn read(&self, id: &str) -> Result<serde_json::Value> {
		let bytes = std::fs::read(self.path(id))?;
		Ok(serde_json::from_slice(&bytes)?)
	}

	fn write(&self, id: &str, metadata: &serde_json::Value) -> Result<()> {
		std::fs::create_dir_all(&self.root)?;
		let json = serde_json::to_vec_pretty(metadata)?;
		std::fs::write(self.path(id), json)?;
		Ok(())
	}
}

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
	records: Mutex<HashMap<String, serde_json::Value>>,
}

impl MetadataStore for MemoryMetadataStore {
	fn read(&self, id: &str) -> Result<serde_json::Value> {
		let records = self
			.records
			.lock()
			.map_err(|_| Error::InvalidInput("the metadata store lock is poisoned".to_owned()))?;
		records.get(id).cloned().ok_or_else(|| {
			Error::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("no metadata for \"{}\"", id),
			))
		})
	}

	fn write(&self, id: &str, metadata: &serde_json::Value) -> Result<()> {
		let mut records = self
			.records
			.lock()
			.map_err(|_| Error::InvalidInput("the metadata store lock is poisoned".to_owned()))?;
		records.insert(id.to_owned(), metadata.clone());
		Ok(())
	}
}

/// Stores artifacts as files under `root`, creating parent directories as needed.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
	root: PathBuf,
}

impl FsArtifactStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}
}

impl ArtifactStore for FsArtifactStore {
	fn read(&self, uri: &str) -> Result<Vec<u8>> {
		Ok(std::fs::read(self.root.join(uri))?)
	}

	fn write(&self, uri: &str, bytes: &[u8]) -> Result<()> {
		let path = self.root.join(uri);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, bytes)?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::error::ErrorKind;

	#[test]
	fn test_fs_stores() {
		let dir = tempfile::tempdir().unwrap();
		let artifacts = FsArtifactStore::new(dir.path().join("models"));
		let uri = model_uri("problem", "model");
		assert_eq!(uri, "problem/model/model.msgpack");
		artifacts.write(&uri, b"bytes").unwrap();
		assert_eq!(artifacts.read(&uri).unwrap(), b"bytes");

		let metadata = FsMetadataStore::new(dir.path().join("metadata"));
		let record = serde_json::json!({ "model_id": "model" });
		metadata.write("model", &record).unwrap();
		assert_eq!(metadata.read("model").unwrap(), record);
		assert!(dir.path().join("metadata/model.json").exists());
	}

	#[test]
	fn test_missing_data_source() {
		let source = FsDataSource::default();
		let error = source.read("/this/file/does/not/exist.csv").unwrap_err();
		assert!(matches!(error, Error::DataSourceUnavailable { .. }));
		assert_eq!(error.kind(), ErrorKind::Validation);
	}

	#[test]
	fn test_memory_store() {
		let store = MemoryMetadataStore::default();
		assert!(store.read("a").is_err());
		store.write("a", &serde_json::json!(1)).unwrap();
		assert_eq!(store.read("a").unwrap(), serde_json::json!(1));
	}
}
