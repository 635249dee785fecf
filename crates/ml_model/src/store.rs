//! Persistence for the single current model.
//!
//! The store interface is versioned: every save carries a version number and
//! readers ask for the latest one. The filesystem store keeps exactly one
//! slot and overwrites it on every save.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{DeliveryTimeModel, StoreError};

/// Metadata written next to the fitted model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: Uuid,
    /// Monotonically increasing across saves; the first model is version 1.
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    /// Number of labeled rows the model was fit on.
    pub training_rows: usize,
}

/// A model together with its metadata, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub metadata: ModelMetadata,
    pub model: DeliveryTimeModel,
}

impl StoredModel {
    /// Wraps a freshly trained model.
    #[must_use]
    pub fn new(model: DeliveryTimeModel, version: u64, training_rows: usize) -> Self {
        Self {
            metadata: ModelMetadata {
                id: Uuid::new_v4(),
                version,
                trained_at: Utc::now(),
                training_rows,
            },
            model,
        }
    }
}

/// Storage for the current model.
///
/// Single writer: saves are not expected to interleave.
pub trait ModelStore: Send + Sync {
    /// Persists `stored`, replacing whatever was saved before.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be encoded or written.
    fn save(&self, stored: &StoredModel) -> Result<(), StoreError>;

    /// Returns the most recently saved model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing was ever saved, or another
    /// error if the artifact cannot be read.
    fn load_latest(&self) -> Result<StoredModel, StoreError>;

    /// Returns the version of the most recent model, if a readable one exists.
    fn latest_version(&self) -> Option<u64> {
        match self.load_latest() {
            Ok(stored) => Some(stored.metadata.version),
            Err(err) => {
                if !err.is_not_found() {
                    warn!(error = %err, "Ignoring unreadable model");
                }
                None
            }
        }
    }
}

impl<T: ModelStore + ?Sized> ModelStore for Arc<T> {
    fn save(&self, stored: &StoredModel) -> Result<(), StoreError> {
        (**self).save(stored)
    }

    fn load_latest(&self) -> Result<StoredModel, StoreError> {
        (**self).load_latest()
    }

    fn latest_version(&self) -> Option<u64> {
        (**self).latest_version()
    }
}

/// Model store backed by one JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    path: PathBuf,
}

impl FsModelStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn open(&self) -> Result<BufReader<File>, StoreError> {
        match File::open(&self.path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                path: self.path.clone(),
            }),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Leading part of the artifact, decoded without the model body.
#[derive(Deserialize)]
struct Header {
    metadata: ModelMetadata,
}

impl ModelStore for FsModelStore {
    fn save(&self, stored: &StoredModel) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        // Write beside the target and rename over it so readers never see a
        // partially written file.
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, stored).map_err(StoreError::Encode)?;
            writer.flush().map_err(|e| self.io_error(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;

        info!(
            path = %self.path.display(),
            version = stored.metadata.version,
            "Saved model"
        );
        Ok(())
    }

    fn load_latest(&self) -> Result<StoredModel, StoreError> {
        let reader = self.open()?;
        let stored: StoredModel =
            serde_json::from_reader(reader).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            version = stored.metadata.version,
            "Loaded model"
        );
        Ok(stored)
    }

    fn latest_version(&self) -> Option<u64> {
        let reader = match self.open() {
            Ok(reader) => reader,
            Err(err) => {
                if !err.is_not_found() {
                    warn!(error = %err, "Ignoring unreadable model");
                }
                return None;
            }
        };

        match serde_json::from_reader::<_, Header>(reader) {
            Ok(header) => Some(header.metadata.version),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Ignoring corrupt model");
                None
            }
        }
    }
}

/// In-process single-slot store.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    slot: RwLock<Option<StoredModel>>,
}

impl MemoryModelStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, stored: &StoredModel) -> Result<(), StoreError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(stored.clone());
        Ok(())
    }

    fn load_latest(&self) -> Result<StoredModel, StoreError> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| StoreError::NotFound {
                path: PathBuf::from("<memory>"),
            })
    }
}
