//! Browser session abstraction
//!
//! The interpreter, the capture pipeline and the runner only talk to a page
//! through [`PageDriver`]. [`crate::playwright::PlaywrightSession`] is the
//! real implementation; tests substitute scripted drivers.

use async_trait::async_trait;
use mailproof_common::Viewport;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineResult;

/// Load state awaited after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// One open page in one browser instance
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> EngineResult<()>;

    async fn click(&mut self, selector: &str) -> EngineResult<()>;

    async fn fill(&mut self, selector: &str, value: &str) -> EngineResult<()>;

    /// Text content of the first match; `Ok(None)` when the element has none
    async fn text_content(&mut self, selector: &str) -> EngineResult<Option<String>>;

    /// Attribute of the first match; `Ok(None)` when the attribute is absent
    async fn attribute(&mut self, selector: &str, name: &str) -> EngineResult<Option<String>>;

    async fn current_url(&mut self) -> EngineResult<String>;

    async fn title(&mut self) -> EngineResult<String>;

    async fn wait_for_selector(&mut self, selector: &str) -> EngineResult<()>;

    async fn wait_for_load(&mut self, state: LoadState) -> EngineResult<()>;

    /// Idle on the page so late assets settle
    async fn pause(&mut self, duration: Duration) -> EngineResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> EngineResult<()>;

    /// Close the browser gracefully
    async fn close(&mut self) -> EngineResult<()>;

    /// Tear the browser down immediately; safe to call more than once
    fn terminate(&mut self);
}

/// Settings for one browser launch
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub viewport: Viewport,

    /// Per-run scratch directory owned by the caller
    pub workdir: PathBuf,
}

/// Starts isolated browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: LaunchOptions) -> EngineResult<Box<dyn PageDriver>>;
}
