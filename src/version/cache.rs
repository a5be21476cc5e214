use std::fs;
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::release::types::RepositoryIdentity;
use crate::version::semver::{SemanticVersion, parse_version};

/// On-disk record: `{"version": "1.2.0"}`, or `{"version": null}` when nothing is installed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CacheRecord {
    version: Option<String>,
}

/// Trait for storing and retrieving the installed version of one repository
#[cfg_attr(test, automock)]
pub trait InstalledVersionStore {
    /// Get the last successfully installed version, if any is known
    fn installed_version(&mut self) -> Option<SemanticVersion>;

    /// Record a newly installed version, persisting it before returning
    fn record_installed(&mut self, version: &SemanticVersion) -> Result<(), CacheError>;
}

/// JSON file cache of the last installed version, one file per repository
pub struct VersionCache {
    path: PathBuf,
    record: Option<CacheRecord>,
}

impl VersionCache {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            record: None,
        }
    }

    /// Cache file for `repo` inside `dir`, named after owner and repository
    pub fn for_repository(dir: &Path, repo: &RepositoryIdentity) -> Self {
        Self::at(dir.join(repo.cache_file_name()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record on first access.
    ///
    /// A missing or corrupt file yields an empty record, which is written back
    /// so the next run starts from a valid file.
    fn record(&mut self) -> &CacheRecord {
        if self.record.is_none() {
            let record = self.load().unwrap_or_else(|| {
                let empty = CacheRecord::default();
                if let Err(e) = self.save(&empty) {
                    warn!("Unable to reinitialize cache {:?}: {}", self.path, e);
                }
                empty
            });
            self.record = Some(record);
        }
        self.record.get_or_insert_with(CacheRecord::default)
    }

    fn load(&self) -> Option<CacheRecord> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("Unable to read cache {:?}: {}", self.path, e);
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_slice(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("Unable to load cache {:?}: {}", self.path, e);
                return None;
            }
        };

        if let Some(text) = &record.version {
            if let Err(e) = parse_version(text) {
                warn!("Ignoring cached version in {:?}: {}", self.path, e);
                return None;
            }
        }

        Some(record)
    }

    fn save(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let io_error = |source: std::io::Error| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let content = serde_json::to_vec_pretty(record)?;
        fs::write(&self.path, content).map_err(io_error)?;

        debug!("Saved cache {:?}", self.path);
        Ok(())
    }
}

impl InstalledVersionStore for VersionCache {
    fn installed_version(&mut self) -> Option<SemanticVersion> {
        self.record()
            .version
            .as_deref()
            .and_then(|text| parse_version(text).ok())
    }

    fn record_installed(&mut self, version: &SemanticVersion) -> Result<(), CacheError> {
        let record = CacheRecord {
            version: Some(version.to_string()),
        };
        self.record = Some(record.clone());
        self.save(&record)?;

        info!("Recorded installed version {} in {:?}", version, self.path);
        Ok(())
    }
}
