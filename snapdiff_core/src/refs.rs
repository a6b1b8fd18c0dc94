//! Named snapshot references.
//!
//! A ref is a file under `refs/` holding one snapshot ID per line. Updates
//! append; the last valid line is the current value, so the file doubles as
//! the ref's history.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repository::Repository;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Whether `name` can be used as a ref name.
pub fn is_valid_ref_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

/// Manages named snapshot references in a repository.
pub struct RefManager<'a> {
    repo: &'a Repository,
}

impl<'a> RefManager<'a> {
    pub(crate) fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_ref_name(name) {
            return Err(Error::invalid_ref(format!(
                "Invalid ref name: {:?} (must be non-empty, without .. or path separators)",
                name
            )));
        }

        Ok(self.repo.root().join("refs").join(name))
    }

    /// Point `name` at snapshot `id`.
    ///
    /// The snapshot must exist in the repository.
    pub fn add(&self, name: &str, id: &Hash) -> Result<()> {
        let path = self.ref_path(name)?;

        if !self.repo.snapshot_path(id).exists() {
            return Err(Error::snapshot_not_found(id.to_hex()));
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{}", id.to_hex())?;

        Ok(())
    }

    /// Current value of a ref, if it exists.
    ///
    /// Blank lines, `#` comments and unparseable lines are skipped.
    pub fn get(&self, name: &str) -> Result<Option<Hash>> {
        let path = self.ref_path(name)?;

        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| Hash::from_hex(line).ok())
            .last())
    }

    /// All refs with a value, sorted by name.
    pub fn list(&self) -> Result<Vec<(String, Hash)>> {
        let refs_dir = self.repo.root().join("refs");
        let mut refs = Vec::new();

        for entry in fs::read_dir(&refs_dir)? {
            let path = entry?.path();

            if path.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
                && let Some(id) = self.get(name)?
            {
                refs.push((name.to_string(), id));
            }
        }

        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }

    /// Remove a ref.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.ref_path(name)?;

        if !path.exists() {
            return Err(Error::ref_not_found(name));
        }

        fs::remove_file(&path)?;
        Ok(())
    }
}
