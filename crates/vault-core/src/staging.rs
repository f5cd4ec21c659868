//! Pending filesystem paths and their expansion into entry keys

use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{VaultError, VaultResult};

/// In-memory list of paths waiting for the next commit
#[derive(Debug, Default)]
pub struct StagingArea {
    paths: Vec<PathBuf>,
}

/// A regular file to store, and the key it will be stored under
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFile {
    pub disk_path: PathBuf,
    pub key: String,
}

/// Result of expanding one staged path
#[derive(Debug, Default)]
pub struct Expansion {
    pub files: Vec<PlannedFile>,
    pub failures: Vec<(PathBuf, String)>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path for the next commit
    ///
    /// The path must exist right now. It is stored in absolute form with
    /// symlinks left in place, so entries keep the name the caller used;
    /// staging the same path twice keeps a single copy.
    pub fn stage(&mut self, path: &Path) -> VaultResult<PathBuf> {
        let absolute = lexical_absolute(path)?;
        std::fs::metadata(&absolute).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VaultError::PathNotFound(path.to_path_buf()),
            _ => VaultError::Io(e),
        })?;

        if !self.paths.contains(&absolute) {
            self.paths.push(absolute.clone());
        }
        Ok(absolute)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Drop staged paths whose file name is `name`
    pub fn unstage_named(&mut self, name: &str) -> Vec<PathBuf> {
        let (dropped, kept): (Vec<PathBuf>, Vec<PathBuf>) = std::mem::take(&mut self.paths)
            .into_iter()
            .partition(|p| p.file_name().is_some_and(|n| n == name));
        self.paths = kept;
        dropped
    }
}

/// Make `path` absolute and fold `.`/`..` without touching the filesystem
fn lexical_absolute(path: &Path) -> VaultResult<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Expand a staged path into the files it contributes
///
/// A file is keyed by its own name. A directory contributes every regular
/// file beneath it, keyed by the path relative to the directory's parent, so
/// the directory name becomes the key prefix. Problems with individual files
/// are collected instead of aborting the walk.
pub fn expand(path: &Path) -> Expansion {
    let mut expansion = Expansion::default();

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            expansion.failures.push((path.to_path_buf(), e.to_string()));
            return expansion;
        }
    };

    if metadata.is_file() {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => expansion.files.push(PlannedFile {
                disk_path: path.to_path_buf(),
                key: name.to_string(),
            }),
            None => expansion
                .failures
                .push((path.to_path_buf(), "file name is not valid UTF-8".to_string())),
        }
        return expansion;
    }

    if !metadata.is_dir() {
        expansion
            .failures
            .push((path.to_path_buf(), "not a regular file or directory".to_string()));
        return expansion;
    }

    let base = path.parent().unwrap_or(path);
    for entry_result in WalkDir::new(path).follow_links(true).sort_by_file_name() {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                let failed = e.path().unwrap_or(path).to_path_buf();
                expansion.failures.push((failed, e.to_string()));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry_key(base, entry.path()) {
            Some(key) => expansion.files.push(PlannedFile {
                disk_path: entry.path().to_path_buf(),
                key,
            }),
            None => expansion.failures.push((
                entry.path().to_path_buf(),
                "path cannot be expressed as an entry key".to_string(),
            )),
        }
    }

    expansion
}

/// Build a `/`-separated key for `path` relative to `base`
fn entry_key(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn keys(expansion: &Expansion) -> Vec<&str> {
        expansion.files.iter().map(|f| f.key.as_str()).collect()
    }

    #[test]
    fn test_stage_requires_existing_path() {
        let temp_dir = TempDir::new().unwrap();
        let mut staging = StagingArea::new();

        let missing = temp_dir.path().join("missing.txt");
        assert!(matches!(staging.stage(&missing), Err(VaultError::PathNotFound(_))));
        assert!(staging.is_empty());

        fs::write(&missing, b"now here").unwrap();
        let staged = staging.stage(&missing).unwrap();
        assert!(staged.is_absolute());
        assert_eq!(staging.paths().len(), 1);
    }

    #[test]
    fn test_stage_is_rechecked_and_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"a").unwrap();

        let mut staging = StagingArea::new();
        staging.stage(&file).unwrap();
        staging.stage(&file).unwrap();
        assert_eq!(staging.paths().len(), 1);

        fs::remove_file(&file).unwrap();
        assert!(matches!(staging.stage(&file), Err(VaultError::PathNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_keeps_symlink_names() {
        let temp_dir = TempDir::new().unwrap();
        let real_file = temp_dir.path().join("real_name.txt");
        let actual_dir = temp_dir.path().join("actual_dir");
        fs::write(&real_file, b"note").unwrap();
        fs::create_dir(&actual_dir).unwrap();
        fs::write(actual_dir.join("a.txt"), b"a").unwrap();

        let notes = temp_dir.path().join("notes.txt");
        let docs = temp_dir.path().join("docs");
        std::os::unix::fs::symlink(&real_file, &notes).unwrap();
        std::os::unix::fs::symlink(&actual_dir, &docs).unwrap();

        let mut staging = StagingArea::new();
        let staged_notes = staging.stage(&notes).unwrap();
        let staged_docs = staging.stage(&docs).unwrap();
        assert!(staged_notes.ends_with("notes.txt"));
        assert!(staged_docs.ends_with("docs"));

        assert_eq!(keys(&expand(&staged_notes)), vec!["notes.txt"]);
        assert_eq!(keys(&expand(&staged_docs)), vec!["docs/a.txt"]);

        assert_eq!(staging.unstage_named("notes.txt").len(), 1);
        assert_eq!(staging.unstage_named("docs").len(), 1);
        assert!(staging.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_rejects_dangling_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("dangling");
        std::os::unix::fs::symlink(temp_dir.path().join("nowhere"), &link).unwrap();

        let mut staging = StagingArea::new();
        assert!(matches!(staging.stage(&link), Err(VaultError::PathNotFound(_))));
    }

    #[test]
    fn test_stage_folds_dot_segments() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path().join("docs");
        fs::create_dir(&docs).unwrap();

        let mut staging = StagingArea::new();
        let staged = staging.stage(&docs.join("..").join("docs").join(".")).unwrap();
        assert!(staged.ends_with("docs"));
        staging.stage(&docs).unwrap();
        assert_eq!(staging.paths().len(), 1);
    }

    #[test]
    fn test_unstage_named() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["keep.txt", "drop.txt"] {
            fs::write(temp_dir.path().join(name), b"x").unwrap();
        }

        let mut staging = StagingArea::new();
        staging.stage(&temp_dir.path().join("keep.txt")).unwrap();
        staging.stage(&temp_dir.path().join("drop.txt")).unwrap();

        let dropped = staging.unstage_named("drop.txt");
        assert_eq!(dropped.len(), 1);
        assert_eq!(staging.paths().len(), 1);
        assert!(staging.paths()[0].ends_with("keep.txt"));
    }

    #[test]
    fn test_expand_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("notes.txt");
        fs::write(&file, b"hello").unwrap();

        let expansion = expand(&file);
        assert_eq!(keys(&expansion), vec!["notes.txt"]);
        assert!(expansion.failures.is_empty());
    }

    #[test]
    fn test_expand_directory_uses_directory_name_as_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path().join("docs");
        fs::create_dir_all(docs.join("b")).unwrap();
        fs::create_dir_all(docs.join("empty")).unwrap();
        fs::write(docs.join("a.txt"), b"a").unwrap();
        fs::write(docs.join("b").join("c.txt"), b"c").unwrap();

        let expansion = expand(&docs);
        assert_eq!(keys(&expansion), vec!["docs/a.txt", "docs/b/c.txt"]);
        assert!(expansion.failures.is_empty());
    }

    #[test]
    fn test_expand_vanished_path_is_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let expansion = expand(&temp_dir.path().join("gone"));

        assert!(expansion.files.is_empty());
        assert_eq!(expansion.failures.len(), 1);
    }

    #[test]
    fn test_entry_key_rejects_non_descendants() {
        let base = Path::new("/srv/data");
        assert_eq!(entry_key(base, Path::new("/srv/data/x/y.bin")), Some("x/y.bin".to_string()));
        assert_eq!(entry_key(base, Path::new("/srv/other/y.bin")), None);
        assert_eq!(entry_key(base, base), None);
    }
}
