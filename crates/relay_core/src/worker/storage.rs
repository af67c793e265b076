//! Artifact storage and output naming.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::StorageError;
use crate::models::{ArtifactLocation, StageId};

/// Object storage a worker reads inputs from and writes outputs to.
pub trait ArtifactStorage: Send + Sync {
    /// Fetch the artifact into `work_dir`, returning the local path.
    fn retrieve(&self, location: &ArtifactLocation, work_dir: &Path)
        -> Result<PathBuf, StorageError>;

    /// Upload the local file at `path` to `location`.
    fn store(&self, location: &ArtifactLocation, path: &Path) -> Result<(), StorageError>;
}

/// Output bucket for an input bucket.
///
/// `sandbox.example.org` becomes `sandbox-output.example.org`; a bucket
/// without a dot gets `-output` appended.
pub fn output_bucket(bucket: &str) -> String {
    match bucket.split_once('.') {
        Some((head, rest)) => format!("{}-output.{}", head, rest),
        None => format!("{}-output", bucket),
    }
}

/// Output key for a stage: `dir/name.ext` becomes `name.workerN.ext`.
pub fn output_key(key: &str, stage: StageId) -> String {
    let path = Path::new(key);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| key.to_string());
    match path.extension() {
        Some(ext) => format!("{}.worker{}.{}", stem, stage, ext.to_string_lossy()),
        None => format!("{}.worker{}", stem, stage),
    }
}

/// Where a stage stores its output for `input`.
pub fn output_location(input: &ArtifactLocation, stage: StageId) -> ArtifactLocation {
    ArtifactLocation::new(output_bucket(&input.bucket), output_key(&input.key, stage))
}

/// Filesystem-backed object storage laid out as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the object behind `location`.
    ///
    /// Bucket and key must stay inside the storage root.
    pub fn object_path(&self, location: &ArtifactLocation) -> Result<PathBuf, StorageError> {
        if !is_contained(&location.bucket) || location.bucket.contains('/') {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        if !is_contained(&location.key) {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(&location.bucket).join(&location.key))
    }
}

/// Non-empty relative path made of normal components only.
fn is_contained(part: &str) -> bool {
    let path = Path::new(part);
    !part.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

impl ArtifactStorage for LocalStorage {
    fn retrieve(
        &self,
        location: &ArtifactLocation,
        work_dir: &Path,
    ) -> Result<PathBuf, StorageError> {
        let source = self.object_path(location)?;
        if !source.is_file() {
            return Err(StorageError::NotFound(location.to_string()));
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| StorageError::InvalidLocation(location.to_string()))?;
        let target = work_dir.join(file_name);

        tracing::info!("Downloading {} to {}", location, target.display());
        fs::create_dir_all(work_dir).map_err(|e| StorageError::io("create work dir", e))?;
        fs::copy(&source, &target).map_err(|e| StorageError::io("retrieve artifact", e))?;
        Ok(target)
    }

    fn store(&self, location: &ArtifactLocation, path: &Path) -> Result<(), StorageError> {
        let target = self.object_path(location)?;

        tracing::info!("Uploading from {} to {}", path.display(), location);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io("create bucket dir", e))?;
        }
        fs::copy(path, &target).map_err(|e| StorageError::io("store artifact", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stage(n: u8) -> StageId {
        StageId::new(n).unwrap()
    }

    #[test]
    fn output_bucket_inserts_suffix_before_first_dot() {
        assert_eq!(output_bucket("sandbox.dwelch91.org"), "sandbox-output.dwelch91.org");
        assert_eq!(output_bucket("media"), "media-output");
    }

    #[test]
    fn output_key_tags_stage() {
        assert_eq!(
            output_key("GoldenDemoContentDon_2.mxf", stage(1)),
            "GoldenDemoContentDon_2.worker1.mxf"
        );
        assert_eq!(output_key("uploads/clip.mp4", stage(3)), "clip.worker3.mp4");
        assert_eq!(output_key("noext", stage(2)), "noext.worker2");
    }

    #[test]
    fn output_location_combines_both() {
        let input = ArtifactLocation::new("in.example.org", "a/b.mov");
        let out = output_location(&input, stage(2));
        assert_eq!(out, ArtifactLocation::new("in-output.example.org", "b.worker2.mov"));
    }

    #[test]
    fn retrieve_copies_into_work_dir() {
        let root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let storage = LocalStorage::new(root.path());
        let object = root.path().join("bucket").join("uploads").join("clip.mp4");
        fs::create_dir_all(object.parent().unwrap()).unwrap();
        fs::write(&object, b"frames").unwrap();

        let local = storage
            .retrieve(&ArtifactLocation::new("bucket", "uploads/clip.mp4"), work.path())
            .unwrap();

        assert_eq!(local, work.path().join("clip.mp4"));
        assert_eq!(fs::read(&local).unwrap(), b"frames");
    }

    #[test]
    fn retrieve_missing_object_is_not_found() {
        let root = tempdir().unwrap();
        let storage = LocalStorage::new(root.path());
        let result = storage.retrieve(&ArtifactLocation::new("bucket", "absent.mp4"), root.path());
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn store_creates_bucket_layout() {
        let root = tempdir().unwrap();
        let storage = LocalStorage::new(root.path());
        let local = root.path().join("out.mp4");
        fs::write(&local, b"encoded").unwrap();

        storage
            .store(&ArtifactLocation::new("bucket-output", "out.worker1.mp4"), &local)
            .unwrap();

        let stored = root.path().join("bucket-output").join("out.worker1.mp4");
        assert_eq!(fs::read(stored).unwrap(), b"encoded");
    }

    #[test]
    fn rejects_locations_escaping_root() {
        let storage = LocalStorage::new("/srv/objects");
        for (bucket, key) in [
            ("bucket", "../etc/passwd"),
            ("bucket", "/abs/key"),
            ("..", "key"),
            ("a/b", "key"),
            ("bucket", ""),
        ] {
            let result = storage.object_path(&ArtifactLocation::new(bucket, key));
            assert!(
                matches!(result, Err(StorageError::InvalidLocation(_))),
                "{}/{} should be rejected",
                bucket,
                key
            );
        }
    }
}
