//! Staged artifact writes
//!
//! Every artifact is first written to a temporary file next to its
//! destination. Only when all of them are staged are they renamed into
//! place, so a failure while staging leaves the output tree untouched.
//!
//! The renames themselves are not atomic as a set. If one fails, the
//! artifacts renamed before it keep their new contents, the rest keep their
//! old ones, and the remaining temporary files are removed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::emit::Artifact;
use crate::error::{GenError, Result};

struct Staged {
    file: NamedTempFile,
    destination: PathBuf,
}

fn stage(root: &Path, artifact: &Artifact) -> Result<Staged> {
    let destination = root.join(&artifact.relative_path);
    let parent = destination.parent().unwrap_or(root);
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(artifact.contents.as_bytes())?;
    file.as_file().sync_all()?;
    debug!(path = %destination.display(), bytes = artifact.contents.len(), "staged artifact");
    Ok(Staged { file, destination })
}

/// Write `artifacts` under `root`; returns the written paths in order.
///
/// A [`GenError::Persist`] means the tree may mix old and new artifacts.
pub fn write_artifacts(root: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    // Dropping a staged file deletes it, so an early return cleans up.
    let staged = artifacts
        .iter()
        .map(|artifact| stage(root, artifact))
        .collect::<Result<Vec<_>>>()?;

    let mut written = Vec::with_capacity(staged.len());
    for Staged { file, destination } in staged {
        if destination.exists() {
            warn!(path = %destination.display(), "overwriting existing artifact");
        }
        file.persist(&destination).map_err(|err| GenError::Persist {
            path: destination.clone(),
            source: err.error,
        })?;
        written.push(destination);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::ArtifactKey;

    fn artifact(path: &str, contents: &str) -> Artifact {
        Artifact {
            key: ArtifactKey::Packing,
            relative_path: PathBuf::from(path),
            contents: contents.to_string(),
        }
    }

    #[test]
    fn test_writes_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_artifacts(
            dir.path(),
            &[artifact("a/b.rs", "first"), artifact("c.rs", "second")],
        )
        .unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("a/b.rs")).unwrap(), "first");
        assert_eq!(fs::read_to_string(dir.path().join("c.rs")).unwrap(), "second");
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.rs"), "old").unwrap();
        write_artifacts(dir.path(), &[artifact("x.rs", "new")]).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("x.rs")).unwrap(), "new");
    }

    #[test]
    fn test_failed_staging_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where a directory is needed
        fs::write(dir.path().join("blocked"), "").unwrap();
        let result = write_artifacts(
            dir.path(),
            &[artifact("ok.rs", "fine"), artifact("blocked/inner.rs", "never")],
        );
        assert!(result.is_err());
        assert!(!dir.path().join("ok.rs").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("blocked")]);
    }

    #[test]
    fn test_failed_rename_keeps_earlier_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("first.rs"), "old").unwrap();
        // a non-empty directory cannot be replaced by a file
        fs::create_dir(dir.path().join("taken")).unwrap();
        fs::write(dir.path().join("taken/keep.rs"), "").unwrap();

        let result = write_artifacts(
            dir.path(),
            &[artifact("first.rs", "new"), artifact("taken", "never"), artifact("last.rs", "never")],
        );
        assert!(matches!(result, Err(GenError::Persist { .. })));
        assert_eq!(fs::read_to_string(dir.path().join("first.rs")).unwrap(), "new");
        assert!(!dir.path().join("last.rs").exists());

        let mut leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        leftovers.sort();
        assert_eq!(leftovers, ["first.rs", "taken"]);
    }
}
