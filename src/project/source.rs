//! The source database: which file every [`FileId`] stands for.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::base::FileId;
use crate::hir::Diagnostic;

/// Maps paths to stable file ids and keeps the text that was parsed.
///
/// Shared by reference between batch workers; ids are unique across the
/// whole run.
#[derive(Debug, Default)]
pub struct SourceDb {
    inner: RwLock<SourceDbInner>,
}

#[derive(Debug, Default)]
struct SourceDbInner {
    path_to_id: IndexMap<PathBuf, FileId>,
    id_to_path: IndexMap<FileId, PathBuf>,
    contents: IndexMap<FileId, Arc<str>>,
    next_id: u32,
}

impl SourceDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the id for `path`.
    pub fn file_id(&self, path: &Path) -> FileId {
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.path_to_id.get(path) {
                return id;
            }
        }

        let mut inner = self.inner.write();
        if let Some(&id) = inner.path_to_id.get(path) {
            return id;
        }
        let id = FileId::new(inner.next_id);
        inner.next_id += 1;
        inner.path_to_id.insert(path.to_owned(), id);
        inner.id_to_path.insert(id, path.to_owned());
        id
    }

    /// Register `path` with `text` and return its id.
    pub fn add(&self, path: &Path, text: impl Into<Arc<str>>) -> FileId {
        let id = self.file_id(path);
        self.set_contents(id, text);
        id
    }

    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.inner.read().id_to_path.get(&file).cloned()
    }

    pub fn set_contents(&self, file: FileId, contents: impl Into<Arc<str>>) {
        self.inner.write().contents.insert(file, contents.into());
    }

    pub fn contents(&self, file: FileId) -> Option<Arc<str>> {
        self.inner.read().contents.get(&file).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().path_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered ids, in registration order.
    pub fn files(&self) -> Vec<FileId> {
        self.inner.read().id_to_path.keys().copied().collect()
    }

    /// Render `diagnostic` with paths from this database.
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        diagnostic.render(|file| self.path(file))
    }
}
