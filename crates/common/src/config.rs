//! mailproof configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::Viewport;
use crate::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store directory path (database lives here)
    pub store_path: PathBuf,

    /// Static-serving root; screenshots land under `<root>/screenshots`
    pub static_root: PathBuf,

    /// Headless browser configuration
    pub browser: BrowserSettings,

    /// Scenario verification configuration
    pub verification: VerificationSettings,

    /// Batch generation configuration
    pub generation: GenerationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: crate::default_store_path(),
            static_root: PathBuf::from("static"),
            browser: BrowserSettings::default(),
            verification: VerificationSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

/// Browser driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Node.js binary used to host the Playwright driver
    pub node_binary: String,

    /// `node_modules` directory that provides `playwright` (sets NODE_PATH)
    pub node_path: Option<PathBuf>,

    /// Run Chromium headless
    pub headless: bool,

    /// Extra Chromium launch arguments
    pub launch_args: Vec<String>,

    /// Timeout for a single page operation, in milliseconds
    pub op_timeout_ms: u64,

    /// Timeout for browser launch, in milliseconds
    pub launch_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            node_path: None,
            headless: true,
            // Container-friendly flags
            launch_args: [
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-accelerated-2d-canvas",
                "--no-first-run",
                "--no-zygote",
                "--disable-gpu",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            op_timeout_ms: 5_000,
            launch_timeout_ms: 15_000,
        }
    }
}

impl BrowserSettings {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }
}

/// Scenario run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    /// Hard wall-clock ceiling for one run, in seconds
    pub run_timeout_secs: u64,

    /// Capture a full-page screenshot when a run fails or errors
    pub screenshot_on_failure: bool,

    /// Upper bound for the failure screenshot, in milliseconds
    pub capture_grace_ms: u64,

    /// Viewport for scenario pages
    pub viewport: Viewport,

    /// Scenarios executed at once by `run_many`
    pub concurrency: usize,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            run_timeout_secs: 30,
            screenshot_on_failure: true,
            capture_grace_ms: 5_000,
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            concurrency: 2,
        }
    }
}

impl VerificationSettings {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn capture_grace(&self) -> Duration {
        Duration::from_millis(self.capture_grace_ms)
    }
}

/// Generation batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Capture a thumbnail for every generated email
    pub thumbnails: bool,

    pub thumbnail_viewport: Viewport,

    pub preview_viewport: Viewport,

    /// Delay before a preview capture so late assets settle, in milliseconds
    pub preview_settle_ms: u64,

    /// Upper bound for a single capture, in seconds
    pub capture_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            thumbnails: true,
            thumbnail_viewport: Viewport::THUMBNAIL,
            preview_viewport: Viewport::TEMPLATE_PREVIEW,
            preview_settle_ms: 1_000,
            capture_timeout_secs: 30,
        }
    }
}

impl GenerationSettings {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.verification.concurrency == 0 {
            return Err(Error::InvalidConfig("verification.concurrency must be at least 1".into()));
        }
        if self.verification.run_timeout_secs == 0 {
            return Err(Error::InvalidConfig("verification.run_timeout_secs must be positive".into()));
        }
        for (name, viewport) in [
            ("verification.viewport", self.verification.viewport),
            ("generation.thumbnail_viewport", self.generation.thumbnail_viewport),
            ("generation.preview_viewport", self.generation.preview_viewport),
        ] {
            if viewport.width == 0 || viewport.height == 0 {
                return Err(Error::InvalidConfig(format!("{} must be non-empty", name)));
            }
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("mailproof.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.generation.thumbnail_viewport, Viewport { width: 600, height: 800 });
        assert_eq!(config.generation.preview_viewport, Viewport { width: 800, height: 600 });
        assert_eq!(config.verification.run_timeout(), Duration::from_secs(30));
        assert!(config.browser.headless);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mailproof.toml");
        std::fs::write(
            &path,
            "static_root = \"public\"\n[verification]\nrun_timeout_secs = 5\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.static_root, PathBuf::from("public"));
        assert_eq!(config.verification.run_timeout_secs, 5);
        assert!(config.verification.screenshot_on_failure);
        assert_eq!(config.browser.op_timeout_ms, 5_000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("conf/mailproof.toml");
        let mut config = Config::default();
        config.generation.thumbnails = false;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(!loaded.generation.thumbnails);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mailproof.toml");
        std::fs::write(&path, "[verification]\nconcurrency = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/mailproof.toml")).unwrap();
        assert_eq!(config.verification.concurrency, 2);
    }
}
