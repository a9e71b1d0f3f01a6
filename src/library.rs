//! Template library loading with caching
//!
//! Shared template libraries are read once per source and kept behind an
//! `Arc` in a concurrent map, so parallel expansions share the parsed sets.
//! Load failures are fail-soft: they log, return an empty set and are not
//! cached, so a later call retries once the file appears.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{EngineError, Result};
use crate::value::{Mapping, Value};

/// Logical source name for the conventional default library
pub const DEFAULT_SOURCE: &str = "templates";

/// File backing [`DEFAULT_SOURCE`] inside the defaults directory
pub const DEFAULT_LIBRARY_FILE: &str = "templates.yml";

/// Raw templates by name. Entries may still be in the one-element sequence form.
pub type TemplateSet = Mapping;

/// Read and parse a YAML file into the value model.
pub(crate) fn read_yaml_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(EngineError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Template library loader with a per-source cache
#[derive(Debug)]
pub struct TemplateLibrary {
    defaults_dir: PathBuf,
    cache: DashMap<String, Arc<TemplateSet>>,
}

impl TemplateLibrary {
    pub fn new(defaults_dir: impl Into<PathBuf>) -> Self {
        Self {
            defaults_dir: defaults_dir.into(),
            cache: DashMap::new(),
        }
    }

    pub fn defaults_dir(&self) -> &Path {
        &self.defaults_dir
    }

    /// Map a source name to a file: `templates` is the default library,
    /// relative paths live under the defaults directory.
    pub fn source_path(&self, source: &str) -> PathBuf {
        let source = source.trim();
        if source == DEFAULT_SOURCE {
            return self.defaults_dir.join(DEFAULT_LIBRARY_FILE);
        }
        let path = Path::new(source);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.defaults_dir.join(path)
        }
    }

    /// Load the `templates` section of `source`, empty on any failure.
    pub fn load(&self, source: &str) -> Arc<TemplateSet> {
        let key = source.trim();
        if let Some(cached) = self.cache.get(key) {
            return Arc::clone(&cached);
        }

        let path = self.source_path(key);
        match read_templates(&path) {
            Ok(templates) => {
                debug!(source = key, count = templates.len(), "loaded template library");
                let templates = Arc::new(templates);
                self.cache.insert(key.to_string(), Arc::clone(&templates));
                templates
            }
            Err(e) => {
                warn!(source = key, path = %path.display(), error = %e, "failed to load template library");
                Arc::new(TemplateSet::new())
            }
        }
    }

    pub fn is_cached(&self, source: &str) -> bool {
        self.cache.contains_key(source.trim())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop every cached library; the next load re-reads from disk.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Overlay files under the defaults directory, sorted by path.
    ///
    /// The default template library itself is not an overlay file.
    pub fn overlay_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.defaults_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                let is_yaml = matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yml") | Some("yaml")
                );
                is_yaml && path.file_name().and_then(|n| n.to_str()) != Some(DEFAULT_LIBRARY_FILE)
            })
            .collect();
        files.sort();
        files
    }
}

fn read_templates(path: &Path) -> Result<TemplateSet> {
    let doc = read_yaml_file(path)?;
    Ok(doc
        .get("templates")
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default())
}
