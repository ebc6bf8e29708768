// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Persistent tag catalog with validation and crash-safe writes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

use crate::{RelabelError, Result};

/// Catalog schema version written on every persist
pub const VERSION: &str = "1.0.0";

/// Vocabulary used when the backing file is missing, corrupt, or empty
pub const DEFAULT_TAGS: [&str; 11] = [
    "comics",
    "nancy",
    "sluggo",
    "popart",
    "warhol",
    "fineart",
    "advertising",
    "logos",
    "food",
    "horror",
    "western",
];

/// Catalog metadata exposed for UI display and testing
#[derive(Debug, Clone, Serialize)]
pub struct CatalogMetadata {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: String,
}

/// In-memory catalog state; also the persisted payload shape
#[derive(Debug, Clone, Serialize)]
struct CatalogData {
    tags: Vec<String>,
    created: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    version: String,
}

/// Lenient on-disk shape: individual fields may be absent in hand-edited files
#[derive(Debug, Deserialize)]
struct StoredCatalog {
    tags: Option<Vec<String>>,
    created: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    version: Option<String>,
}

/// Persistent tag catalog backed by a JSON file.
///
/// All reads and mutations serialize through one mutex; every mutation is
/// persisted via write-to-temporary-then-rename so a concurrent reader never
/// observes a partial file. Cross-process writers race with last-writer-wins
/// semantics beyond that guarantee.
pub struct TagCatalog {
    tags_file: PathBuf,
    default_tags: Vec<String>,
    data: Mutex<CatalogData>,
}

impl TagCatalog {
    /// Open or initialize the catalog under `config_dir`.
    ///
    /// An empty `default_tags` slice falls back to the shipped vocabulary.
    pub fn open(config_dir: &Path, default_tags: &[String]) -> Result<Self> {
        std::fs::create_dir_all(config_dir)?;
        let tags_file = config_dir.join("tags.json");

        let default_tags: Vec<String> = if default_tags.is_empty() {
            DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
        } else {
            default_tags.to_vec()
        };

        let data = load_payload(&tags_file, &default_tags);
        Ok(Self {
            tags_file,
            default_tags,
            data: Mutex::new(data),
        })
    }

    fn lock_data(&self) -> Result<MutexGuard<'_, CatalogData>> {
        self.data
            .lock()
            .map_err(|_| RelabelError::Config("Tag catalog lock poisoned".to_string()))
    }

    /// Snapshot copy of the current tag list, insertion order preserved
    pub fn get_all(&self) -> Vec<String> {
        self.lock_data().map(|d| d.tags.clone()).unwrap_or_default()
    }

    /// Catalog metadata (created, last_modified, version)
    pub fn metadata(&self) -> Result<CatalogMetadata> {
        let data = self.lock_data()?;
        Ok(CatalogMetadata {
            created: data.created,
            last_modified: data.last_modified,
            version: data.version.clone(),
        })
    }

    /// Validate a prospective tag without mutating state
    pub fn validate(&self, tag: &str) -> Result<()> {
        let data = self.lock_data()?;
        validate_candidate(&data.tags, tag.trim())
    }

    /// Add a new tag if it passes validation; persists on success
    pub fn add(&self, tag: &str) -> Result<()> {
        let candidate = tag.trim().to_string();
        let mut data = self.lock_data()?;
        validate_candidate(&data.tags, &candidate)?;

        data.tags.push(candidate);
        data.last_modified = Utc::now();
        persist(&self.tags_file, &data);
        Ok(())
    }

    /// Bulk add helper; each tag is validated independently
    pub fn add_many(&self, tags: &[String]) -> Vec<(String, Result<()>)> {
        tags.iter()
            .map(|tag| (tag.clone(), self.add(tag)))
            .collect()
    }

    /// Remove a tag, ignoring case; persists on success
    pub fn remove(&self, tag: &str) -> Result<()> {
        let candidate = tag.trim();
        if candidate.is_empty() {
            return Err(RelabelError::EmptyTag);
        }

        let mut data = self.lock_data()?;
        let lower = candidate.to_lowercase();
        match data.tags.iter().position(|t| t.to_lowercase() == lower) {
            Some(idx) => {
                data.tags.remove(idx);
                data.last_modified = Utc::now();
                persist(&self.tags_file, &data);
                Ok(())
            }
            None => Err(RelabelError::TagNotFound(candidate.to_string())),
        }
    }

    /// Re-read the backing file, discarding in-memory state.
    ///
    /// Used to observe out-of-process edits.
    pub fn reload(&self) -> Result<()> {
        let mut data = self.lock_data()?;
        *data = load_payload(&self.tags_file, &self.default_tags);
        Ok(())
    }

    /// Restore the default vocabulary, overwriting all prior tags
    pub fn reset_to_defaults(&self) -> Result<()> {
        let mut data = self.lock_data()?;
        *data = default_payload(&self.default_tags);
        persist(&self.tags_file, &data);
        Ok(())
    }

    /// Path of the backing file
    pub fn tags_file(&self) -> &Path {
        &self.tags_file
    }
}

fn validate_candidate(existing: &[String], candidate: &str) -> Result<()> {
    if candidate.is_empty() {
        return Err(RelabelError::EmptyTag);
    }

    let charset_ok = candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !charset_ok {
        return Err(RelabelError::InvalidTagCharacters);
    }

    let lower = candidate.to_lowercase();
    if existing.iter().any(|t| t.to_lowercase() == lower) {
        return Err(RelabelError::DuplicateTag(candidate.to_string()));
    }

    Ok(())
}

fn default_payload(default_tags: &[String]) -> CatalogData {
    let now = Utc::now();
    CatalogData {
        tags: default_tags.to_vec(),
        created: now,
        last_modified: now,
        version: VERSION.to_string(),
    }
}

/// Load the catalog payload, falling back to defaults (and persisting them)
/// when the file is missing, unparseable, or holds an empty tag list.
fn load_payload(tags_file: &Path, default_tags: &[String]) -> CatalogData {
    let content = match std::fs::read_to_string(tags_file) {
        Ok(content) => content,
        Err(_) => {
            let data = default_payload(default_tags);
            persist(tags_file, &data);
            return data;
        }
    };

    let stored: StoredCatalog = match serde_json::from_str(&content) {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Failed to parse tag catalog {:?}: {}", tags_file, e);
            let data = default_payload(default_tags);
            persist(tags_file, &data);
            return data;
        }
    };

    let now = Utc::now();
    let mut tags = stored.tags.unwrap_or_default();
    if tags.is_empty() {
        tags = default_tags.to_vec();
    }

    CatalogData {
        tags,
        created: stored.created.unwrap_or(now),
        last_modified: stored.last_modified.unwrap_or(now),
        version: stored.version.unwrap_or_else(|| VERSION.to_string()),
    }
}

/// Persist the payload, absorbing write failures (logged, never raised)
fn persist(tags_file: &Path, data: &CatalogData) {
    if let Err(e) = write_payload(tags_file, data) {
        error!("Failed to persist tag catalog {:?}: {}", tags_file, e);
    }
}

/// Write the payload to a temporary file in the same directory, fsync, and
/// atomically rename it over the catalog file. The schema version is always
/// stamped with the current [`VERSION`].
fn write_payload(tags_file: &Path, data: &CatalogData) -> Result<()> {
    let payload = CatalogData {
        tags: data.tags.clone(),
        created: data.created,
        last_modified: data.last_modified,
        version: VERSION.to_string(),
    };

    let tmp_file = tags_file.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&payload)?;
    {
        let mut file = std::fs::File::create(&tmp_file)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_file, tags_file)?;
    Ok(())
}
