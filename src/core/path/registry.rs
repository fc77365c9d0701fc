use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use super::PathError;

/// Maximum number of directories the registry holds.
pub const DEFAULT_CAPACITY: usize = 512;

/// Ordered list of directories searched for external programs.
///
/// Entries are compared as exact strings: `/bin` and `/bin/` are different
/// entries, and duplicates are allowed.
#[derive(Debug, Clone)]
pub struct PathRegistry {
    entries: Vec<String>,
    capacity: usize,
    revision: u64,
}

impl Default for PathRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            revision: 0,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add(&mut self, path: &str) -> Result<(), PathError> {
        if self.entries.len() >= self.capacity {
            return Err(PathError::Full {
                capacity: self.capacity,
            });
        }
        self.entries.push(path.to_string());
        self.revision += 1;
        Ok(())
    }

    /// Removes the first entry equal to `path`.
    pub fn remove(&mut self, path: &str) -> Result<(), PathError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry == path)
            .ok_or_else(|| PathError::NotFound(path.to_string()))?;
        self.entries.remove(index);
        self.revision += 1;
        Ok(())
    }

    /// Directories to search, in order. The registry is authoritative once it
    /// has any entry; while it is empty the inherited `PATH` is used.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.entries.is_empty() {
            return self.entries.iter().map(PathBuf::from).collect();
        }
        env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default()
    }

    /// Every path `name` may be executed from, in search order.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        if name.contains('/') {
            return vec![PathBuf::from(name)];
        }
        self.search_dirs()
            .into_iter()
            .map(|dir| join(&dir, name))
            .collect()
    }
}

fn join(dir: &Path, name: &str) -> PathBuf {
    if dir.as_os_str().is_empty() {
        // An empty PATH element means the current directory.
        Path::new(".").join(name)
    } else {
        dir.join(name)
    }
}

impl fmt::Display for PathRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path: {}", self.entries.join(":"))
    }
}
