//! Screenshot artifact storage under the static-serving root
//!
//! Files are named by a random identifier so concurrent captures never
//! collide. Callers only ever see paths relative to the root, which is what
//! the serving layer exposes.

use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SCREENSHOTS_DIR: &str = "screenshots";

/// A reserved location for a new artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSlot {
    pub absolute: PathBuf,
    pub relative: String,
}

/// Artifact store rooted at the static directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating the directory layout
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(SCREENSHOTS_DIR)).await?;
        info!("Initialized artifact store at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOTS_DIR)
    }

    /// Reserve a unique PNG path whose file name starts with `prefix`
    pub fn allocate(&self, prefix: &str) -> ArtifactSlot {
        let file_name = format!("{}{}.png", prefix, Uuid::new_v4());
        ArtifactSlot {
            absolute: self.screenshots_dir().join(&file_name),
            relative: format!("{}/{}", SCREENSHOTS_DIR, file_name),
        }
    }

    /// Resolve a relative artifact path back to the filesystem
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Compute SHA-256 hash of data
    pub fn hash(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute SHA-256 hash of a file
    pub async fn hash_file(path: impl AsRef<Path>) -> Result<String> {
        let mut file = fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];

        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    fn preview_prefix(template_id: &str) -> String {
        format!("template_{}_", template_id)
    }

    /// Reserve a path for a template preview
    pub fn allocate_preview(&self, template_id: &str) -> ArtifactSlot {
        self.allocate(&Self::preview_prefix(template_id))
    }

    async fn previews(&self, template_id: &str) -> Result<Vec<String>> {
        let prefix = Self::preview_prefix(template_id);
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.screenshots_dir()).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".png") {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Relative path of an already captured preview for the template
    pub async fn find_preview(&self, template_id: &str) -> Result<Option<String>> {
        Ok(self
            .previews(template_id)
            .await?
            .into_iter()
            .next()
            .map(|name| format!("{}/{}", SCREENSHOTS_DIR, name)))
    }

    /// Delete every preview of a template, returning how many were removed
    pub async fn delete_previews(&self, template_id: &str) -> Result<usize> {
        let names = self.previews(template_id).await?;
        for name in &names {
            fs::remove_file(self.screenshots_dir().join(name)).await?;
        }
        debug!("Deleted {} preview(s) for template {}", names.len(), template_id);
        Ok(names.len())
    }

    /// Remove one artifact; a missing file is not an error
    pub async fn remove(&self, relative: &str) -> Result<()> {
        let path = self.absolute(relative);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Artifact already gone: {}", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
