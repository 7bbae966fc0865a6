//! CLI Commands

pub mod check;
pub mod generate;
pub mod preview;
pub mod scenario;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use mailproof_common::{ArtifactStore, Config, Database, ProjectBundle};
use mailproof_engine::{PlaywrightLauncher, ScreenshotCapturer};

use crate::output::{print_error, print_info, print_success, OutputFormat};

/// Effective configuration plus output settings, shared by every command
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(config: Config, format: OutputFormat) -> Self {
        Self { config, format }
    }

    pub fn database(&self) -> Result<Database> {
        let path = self.config.db_path();
        Database::open(&path).with_context(|| format!("opening database at {}", path.display()))
    }

    pub async fn store(&self) -> Result<ArtifactStore> {
        ArtifactStore::new(&self.config.static_root)
            .await
            .with_context(|| format!("preparing static root {}", self.config.static_root.display()))
    }

    pub fn launcher(&self) -> Arc<PlaywrightLauncher> {
        Arc::new(PlaywrightLauncher::new(self.config.browser.clone()))
    }

    pub async fn capturer(&self) -> Result<ScreenshotCapturer> {
        Ok(ScreenshotCapturer::new(
            self.launcher(),
            self.store().await?,
            self.config.generation.clone(),
        ))
    }
}

/// Load a project bundle, optionally narrowed to one template
pub fn load_bundle(path: &Path, template: Option<&str>) -> Result<ProjectBundle> {
    let mut bundle = ProjectBundle::from_file(path)
        .with_context(|| format!("loading project bundle {}", path.display()))?;

    if let Some(id) = template {
        bundle.templates.retain(|t| t.id == id);
        if bundle.templates.is_empty() {
            anyhow::bail!("template '{}' not found in {}", id, path.display());
        }
    }
    Ok(bundle)
}

/// Report whether Node can host the Playwright driver
pub fn doctor(ctx: &Context) -> Result<()> {
    let launcher = ctx.launcher();
    let settings = launcher.settings();
    print_info(&format!("Node binary: {}", settings.node_binary));
    if let Some(node_path) = &settings.node_path {
        print_info(&format!("NODE_PATH:   {}", node_path.display()));
    }

    match launcher.check_installed() {
        Ok(()) => {
            print_success("Playwright is available; scenarios run in a real browser");
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            print_info("Scenario runs will fall back to step validation only");
            std::process::exit(1);
        }
    }
}
