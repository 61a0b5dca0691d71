//! Filesystem root for folders and analysis artifacts.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if missing.
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("cannot create storage root {}", self.root.display()))
    }

    /// Resolves an existing file and checks it lies under the root.
    /// Returns `None` when the file is absent or outside the root.
    pub async fn resolve_existing(&self, path: &str) -> Option<PathBuf> {
        let root = tokio::fs::canonicalize(&self.root).await.ok()?;
        let resolved = match tokio::fs::canonicalize(path).await {
            Ok(p) => p,
            Err(_) => return None,
        };
        if resolved.starts_with(&root) {
            Some(resolved)
        } else {
            warn!("Refusing artifact outside storage root: {path}");
            None
        }
    }

    /// Best-effort removal of files under the root. Returns how many were deleted.
    pub async fn remove_files(&self, paths: &[String]) -> usize {
        let mut removed = 0;
        for raw in paths {
            let Some(path) = self.resolve_existing(raw).await else {
                continue;
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Removed {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Could not delete {}: {e}", path.display()),
            }
        }
        removed
    }

    /// Moves a file or directory to a new place under the root.
    /// Returns `false` when `from` does not exist; an occupied `to` is an error.
    pub async fn relocate(&self, from: &Path, to: &Path) -> Result<bool> {
        if !from.starts_with(&self.root) || !to.starts_with(&self.root) {
            bail!(
                "refusing to move {} to {} outside the storage root",
                from.display(),
                to.display()
            );
        }
        if tokio::fs::try_exists(to).await? {
            bail!("{} already exists", to.display());
        }
        match tokio::fs::rename(from, to).await {
            Ok(()) => {
                info!("Moved {} -> {}", from.display(), to.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("cannot move {} to {}", from.display(), to.display())),
        }
    }
}

/// A folder name must be a single, normal path component.
pub fn is_valid_folder_name(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > 255 {
        return false;
    }
    let mut components = Path::new(trimmed).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_names() {
        assert!(is_valid_folder_name("Interviews"));
        assert!(is_valid_folder_name("  B-roll 2024 "));
        assert!(!is_valid_folder_name(""));
        assert!(!is_valid_folder_name("   "));
        assert!(!is_valid_folder_name(".."));
        assert!(!is_valid_folder_name("a/b"));
        assert!(!is_valid_folder_name("/etc"));
    }

    #[tokio::test]
    async fn test_resolve_existing_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("roi.json");
        tokio::fs::write(&file, b"{}").await.unwrap();

        let storage = StorageRoot::new(dir.path());
        let resolved = storage.resolve_existing(file.to_str().unwrap()).await;
        assert!(resolved.is_some());
        assert!(storage
            .resolve_existing(dir.path().join("missing.json").to_str().unwrap())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_resolve_existing_rejects_outside_root() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("secret.json");
        tokio::fs::write(&file, b"{}").await.unwrap();

        let storage = StorageRoot::new(root.path());
        assert!(storage.resolve_existing(file.to_str().unwrap()).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_files_skips_missing_and_outside() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let heatmap = dir.path().join("heatmap.png");
        let foreign = other.path().join("keep.json");
        tokio::fs::write(&data, "{}").await.unwrap();
        tokio::fs::write(&foreign, "{}").await.unwrap();

        let storage = StorageRoot::new(dir.path());
        let paths = [&data, &heatmap, &foreign].map(|p| p.display().to_string());
        assert_eq!(storage.remove_files(&paths).await, 1);
        assert!(!data.exists());
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_relocate_moves_within_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageRoot::new(dir.path());
        let from = dir.path().join("clip.mp4");
        let sub = dir.path().join("Interviews");
        tokio::fs::write(&from, b"video").await.unwrap();
        tokio::fs::create_dir(&sub).await.unwrap();

        let to = sub.join("clip.mp4");
        assert!(storage.relocate(&from, &to).await.unwrap());
        assert!(to.exists());
        assert!(!from.exists());

        // Missing source is not an error.
        assert!(!storage.relocate(&from, &sub.join("other.mp4")).await.unwrap());
    }

    #[tokio::test]
    async fn test_relocate_refuses_occupied_or_outside_target() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let storage = StorageRoot::new(dir.path());
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        tokio::fs::write(&a, b"a").await.unwrap();
        tokio::fs::write(&b, b"b").await.unwrap();

        assert!(storage.relocate(&a, &b).await.is_err());
        assert_eq!(tokio::fs::read(&b).await.unwrap(), b"b");
        assert!(storage.relocate(&a, &other.path().join("a.mp4")).await.is_err());
        assert!(a.exists());
    }
}
