//! Catalog of discoverable action implementations.
//!
//! The index is a cache over one or more lookup paths. The on-disk
//! discovery format is external; it enters the engine through the
//! [`PackageScanner`] seam.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::engine::descriptor::NodeDescriptor;
use crate::engine::error::EngineResult;

/// One discovered implementation: the descriptor it advertises, with
/// `library_path` filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub descriptor: NodeDescriptor,
}

impl IndexEntry {
    pub fn new(descriptor: NodeDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn library_path(&self) -> &str {
        &self.descriptor.library_path
    }
}

/// Scans a filesystem path for action packages.
pub trait PackageScanner: Send + Sync {
    fn scan(&self, root: &Path) -> EngineResult<Vec<IndexEntry>>;
}

/// Scanner backed by a fixed entry list; stands in for the on-disk scan
/// in tests and demos.
#[derive(Clone, Debug, Default)]
pub struct StaticScanner {
    entries: Vec<IndexEntry>,
}

impl StaticScanner {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }
}

impl PackageScanner for StaticScanner {
    fn scan(&self, _root: &Path) -> EngineResult<Vec<IndexEntry>> {
        Ok(self.entries.clone())
    }
}

/// Catalog of action implementations keyed by descriptor fingerprint.
pub struct ActionIndex {
    scanner: Arc<dyn PackageScanner>,
    lookup_paths: Vec<PathBuf>,
    entries: Vec<IndexEntry>,
}

impl ActionIndex {
    pub fn new(scanner: Arc<dyn PackageScanner>) -> Self {
        Self {
            scanner,
            lookup_paths: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Register a lookup path and rebuild the whole cache.
    pub fn add_lookup_path(&mut self, path: impl Into<PathBuf>) -> EngineResult<usize> {
        let path = path.into();
        if !self.lookup_paths.contains(&path) {
            self.lookup_paths.push(path);
        }
        self.rebuild()?;
        info!(entries = self.entries.len(), "action index rebuilt");
        Ok(self.entries.len())
    }

    fn rebuild(&mut self) -> EngineResult<()> {
        let mut entries = Vec::new();
        for path in &self.lookup_paths {
            entries.extend(self.scanner.scan(path)?);
        }
        self.entries = entries;
        Ok(())
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn find_by_full_name(&self, full_name: &str) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.full_name() == full_name)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
