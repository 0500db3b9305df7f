use crate::error::ArtifactError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Content-addressable filesystem layout for snapshot and diff artifacts, rooted at a
/// configured base directory. All writes are atomic from a reader's perspective: data lands
/// in a temporary file in the target directory, then is renamed into place.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn snapshot_dir(&self, site_id: i32, snapshot_id: i32) -> PathBuf {
        self.root.join(site_id.to_string()).join("snapshots").join(snapshot_id.to_string())
    }

    pub fn diff_dir(&self, site_id: i32, old_snapshot_id: i32, new_snapshot_id: i32) -> PathBuf {
        self.root
            .join(site_id.to_string())
            .join("diffs")
            .join(format!("{old_snapshot_id}_{new_snapshot_id}"))
    }

    /// Atomically writes `data` to `dir/filename`, creating `dir` if necessary, and returns the
    /// final path.
    pub fn write(&self, dir: &Path, filename: &str, data: &[u8]) -> Result<PathBuf, ArtifactError> {
        create_dir_all(dir)?;
        let final_path = dir.join(filename);
        let temp_path = dir.join(format!(".{filename}.{}.tmp", Uuid::new_v4()));

        std::fs::write(&temp_path, data).map_err(|source| ArtifactError::Io {
            path: temp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&temp_path, &final_path).map_err(|source| ArtifactError::Io {
            path: final_path.display().to_string(),
            source,
        })?;
        Ok(final_path)
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, ArtifactError> {
        std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn read_to_string(&self, path: &Path) -> Result<String, ArtifactError> {
        std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn size(&self, path: &Path) -> Result<u64, ArtifactError> {
        std::fs::metadata(path)
            .map(|metadata| metadata.len())
            .map_err(|source| ArtifactError::Io {
                path: path.display().to_string(),
                source,
            })
    }
}

fn create_dir_all(dir: &Path) -> Result<(), ArtifactError> {
    std::fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
        path: dir.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(temp.path());
        let dir = store.snapshot_dir(1, 1);

        let path = store.write(&dir, "content.html", b"<html></html>").unwrap();
        assert_eq!(store.read(&path).unwrap(), b"<html></html>");
    }

    #[test]
    fn write_leaves_no_temp_files_behind() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(temp.path());
        let dir = store.snapshot_dir(2, 7);
        store.write(&dir, "content.html", b"hello").unwrap();

        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("content.html")]);
    }
}
