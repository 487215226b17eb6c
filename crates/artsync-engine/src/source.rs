//! Where declaration files come from

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One declaration file: its location and raw content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFile {
    pub location: String,
    pub content: Vec<u8>,
}

/// Supplies the declaration files of one tenant
pub trait DefinitionSource: Send + Sync {
    /// Every file currently declared, sorted by location
    ///
    /// # Errors
    /// Any I/O failure; the pass cannot tell a deleted file from an
    /// unreadable one, so none are returned.
    fn collect(&self) -> io::Result<Vec<DefinitionFile>>;

    /// Human readable origin, for logs
    fn describe(&self) -> String;
}

impl<S: DefinitionSource + ?Sized> DefinitionSource for Arc<S> {
    fn collect(&self) -> io::Result<Vec<DefinitionFile>> {
        (**self).collect()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Files below a registry root directory
///
/// Locations are root-relative with a leading `/` and `/` separators, e.g.
/// `/db/orders.table`. Hidden entries (leading `.`) are skipped.
#[derive(Debug, Clone)]
pub struct FsDefinitionSource {
    root: PathBuf,
}

impl FsDefinitionSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, dir: &Path, files: &mut Vec<DefinitionFile>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.walk(&path, files)?;
            } else if let Some(location) = self.location_of(&path) {
                files.push(DefinitionFile {
                    location,
                    content: fs::read(&path)?,
                });
            }
        }
        Ok(())
    }

    fn location_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(format!("/{}", parts.join("/")))
    }
}

impl DefinitionSource for FsDefinitionSource {
    fn collect(&self) -> io::Result<Vec<DefinitionFile>> {
        if !self.root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("registry root {} is not a directory", self.root.display()),
            ));
        }
        let mut files = Vec::new();
        self.walk(&self.root, &mut files)?;
        files.sort_by(|a, b| a.location.cmp(&b.location));
        debug!(root = %self.root.display(), files = files.len(), "definitions collected");
        Ok(files)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Declarations held in memory, for embedding and tests
#[derive(Debug, Default)]
pub struct InMemoryDefinitionSource {
    files: RwLock<IndexMap<String, Vec<u8>>>,
}

impl InMemoryDefinitionSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn put(&self, location: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(location.into(), content.into());
    }

    pub fn remove(&self, location: &str) -> bool {
        self.files.write().shift_remove(location).is_some()
    }
}

impl DefinitionSource for InMemoryDefinitionSource {
    fn collect(&self) -> io::Result<Vec<DefinitionFile>> {
        let mut files: Vec<_> = self
            .files
            .read()
            .iter()
            .map(|(location, content)| DefinitionFile {
                location: location.clone(),
                content: content.clone(),
            })
            .collect();
        files.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(files)
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn filesystem_locations_are_root_relative() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("db/nested")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("db/orders.table"), b"{}").unwrap();
        fs::write(dir.path().join("db/nested/items.table"), b"[]").unwrap();
        fs::write(dir.path().join(".git/HEAD"), b"ref").unwrap();

        let files = FsDefinitionSource::new(dir.path()).collect().unwrap();
        let locations: Vec<_> = files.iter().map(|f| f.location.as_str()).collect();
        assert_eq!(locations, vec!["/db/nested/items.table", "/db/orders.table"]);
        assert_eq!(files[1].content, b"{}".to_vec());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsDefinitionSource::new(dir.path().join("absent"));
        assert_eq!(source.collect().unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn in_memory_put_and_remove() {
        let source = InMemoryDefinitionSource::new();
        source.put("/b.roles", "[]");
        source.put("/a.roles", "[]");
        assert!(source.remove("/b.roles"));
        assert!(!source.remove("/b.roles"));
        let files = source.collect().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].location, "/a.roles");
    }
}
