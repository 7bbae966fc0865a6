//! Screenshot capture of rendered HTML
//!
//! Every capture gets its own scratch directory and browser; the document
//! is written to disk and loaded over `file://` so relative assets resolve
//! the same way they do for scenario runs.

use mailproof_common::config::GenerationSettings;
use mailproof_common::render::preview_document;
use mailproof_common::{ArtifactStore, Template, Viewport};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::{BrowserLauncher, LaunchOptions, LoadState};
use crate::error::{EngineError, EngineResult};

/// A stored screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    /// Path relative to the static root
    pub relative_path: String,

    pub width: u32,
    pub height: u32,

    /// SHA-256 of the PNG bytes
    pub sha256: String,
}

/// What a capture is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureKind {
    /// Generated email thumbnail
    Thumbnail,
    /// Raw template preview, reused until deleted
    Preview { template_id: String },
}

/// Build a `file://` URL for an absolute path
pub fn file_url(path: &Path) -> EngineResult<String> {
    url::Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|_| EngineError::Driver(format!("not an absolute path: {}", path.display())))
}

/// Captures full-page screenshots into the artifact store
#[derive(Clone)]
pub struct ScreenshotCapturer {
    launcher: Arc<dyn BrowserLauncher>,
    store: ArtifactStore,
    settings: GenerationSettings,
}

impl ScreenshotCapturer {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, store: ArtifactStore, settings: GenerationSettings) -> Self {
        Self {
            launcher,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Render `html` and store a full-page screenshot
    pub async fn capture(&self, html: &str, kind: &CaptureKind) -> EngineResult<ScreenshotArtifact> {
        let (viewport, slot, settle): (Viewport, _, Option<Duration>) = match kind {
            CaptureKind::Thumbnail => (self.settings.thumbnail_viewport, self.store.allocate(""), None),
            CaptureKind::Preview { template_id } => (
                self.settings.preview_viewport,
                self.store.allocate_preview(template_id),
                Some(Duration::from_millis(self.settings.preview_settle_ms)),
            ),
        };

        let workdir = tempfile::Builder::new().prefix("mailproof-capture-").tempdir()?;
        let document = workdir.path().join("document.html");
        tokio::fs::write(&document, html).await?;
        let url = file_url(&document)?;

        debug!("Capturing {:?} at {} into {}", kind, viewport, slot.relative);

        let mut page = self
            .launcher
            .launch(LaunchOptions {
                viewport,
                workdir: workdir.path().to_path_buf(),
            })
            .await?;

        let budget = self.settings.capture_timeout();
        let shot = tokio::time::timeout(budget, async {
            page.goto(&url).await?;
            page.wait_for_load(LoadState::NetworkIdle).await?;
            if let Some(settle) = settle {
                page.pause(settle).await?;
            }
            page.screenshot(&slot.absolute, true).await
        })
        .await;

        let failure = match shot {
            Ok(Ok(())) => {
                if let Err(e) = page.close().await {
                    warn!("Browser close after capture failed: {}", e);
                }
                None
            }
            Ok(Err(e)) => Some(e),
            Err(_) => Some(EngineError::Timeout(format!("capture exceeded {:?}", budget))),
        };

        if let Some(e) = failure {
            page.terminate();
            self.store.remove(&slot.relative).await?;
            return Err(e);
        }
        drop(page);

        if let Err(e) = workdir.close() {
            warn!("Failed to remove capture scratch directory: {}", e);
        }

        match self.describe(&slot.relative).await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                self.store.remove(&slot.relative).await?;
                Err(e)
            }
        }
    }

    /// Dimensions and digest of a stored screenshot
    pub async fn describe(&self, relative: &str) -> EngineResult<ScreenshotArtifact> {
        let path = self.store.absolute(relative);
        let (width, height) = image::image_dimensions(&path)?;
        let sha256 = ArtifactStore::hash_file(&path).await?;
        Ok(ScreenshotArtifact {
            relative_path: relative.to_string(),
            width,
            height,
            sha256,
        })
    }

    /// Preview for a template, capturing one only if none is stored yet
    pub async fn template_preview(&self, template: &Template) -> EngineResult<ScreenshotArtifact> {
        if let Some(existing) = self.store.find_preview(&template.id).await? {
            info!("Reusing preview {} for template {}", existing, template.id);
            return self.describe(&existing).await;
        }

        let artifact = self
            .capture(
                &preview_document(&template.content),
                &CaptureKind::Preview {
                    template_id: template.id.clone(),
                },
            )
            .await?;
        info!("Captured preview {} for template {}", artifact.relative_path, template.id);
        Ok(artifact)
    }

    /// Drop stored previews and capture a fresh one
    pub async fn refresh_preview(&self, template: &Template) -> EngineResult<ScreenshotArtifact> {
        self.delete_previews(&template.id).await?;
        self.template_preview(template).await
    }

    pub async fn delete_previews(&self, template_id: &str) -> EngineResult<usize> {
        Ok(self.store.delete_previews(template_id).await?)
    }
}
