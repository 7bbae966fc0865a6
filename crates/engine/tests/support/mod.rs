//! Scripted in-memory browser for engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use mailproof_common::Viewport;
use mailproof_engine::selector::testid_selector;
use mailproof_engine::{BrowserLauncher, EngineError, EngineResult, LaunchOptions, LoadState, PageDriver};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Page behaviour, keyed by testid
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub present: HashSet<String>,
    pub texts: HashMap<String, String>,
    pub attrs: HashMap<(String, String), String>,
    /// Clicking the key sets text on other testids
    pub on_click: HashMap<String, Vec<(String, String)>>,
    pub title: String,
    /// `waitForSelector` on this testid never returns
    pub hang_on: Option<String>,
    pub fail_screenshot: bool,
    /// Screenshot succeeds but writes bytes that are not a PNG
    pub corrupt_screenshot: bool,
    /// Simulated latency of every page operation
    pub latency: Duration,
}

impl Script {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(5),
            ..Default::default()
        }
    }

    pub fn element(mut self, testid: &str, text: &str) -> Self {
        self.present.insert(testid.to_string());
        self.texts.insert(testid.to_string(), text.to_string());
        self
    }

    pub fn attr(mut self, testid: &str, name: &str, value: &str) -> Self {
        self.present.insert(testid.to_string());
        self.attrs
            .insert((testid.to_string(), name.to_string()), value.to_string());
        self
    }

    pub fn on_click(mut self, testid: &str, target: &str, text: &str) -> Self {
        self.on_click
            .entry(testid.to_string())
            .or_default()
            .push((target.to_string(), text.to_string()));
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn hang_on(mut self, testid: &str) -> Self {
        self.hang_on = Some(testid.to_string());
        self
    }

    pub fn fail_screenshot(mut self) -> Self {
        self.fail_screenshot = true;
        self
    }

    pub fn corrupt_screenshot(mut self) -> Self {
        self.corrupt_screenshot = true;
        self
    }
}

/// Everything the fake observed
#[derive(Debug, Default)]
pub struct Journal {
    pub launches: Vec<LaunchOptions>,
    pub calls: Vec<String>,
    /// Whether `document.html` existed when the page navigated
    pub document_present: Vec<bool>,
    pub closed: usize,
    pub terminated: usize,
}

#[derive(Clone)]
pub struct FakeLauncher {
    script: Script,
    fail_launch: bool,
    /// Time spent starting the browser
    launch_delay: Duration,
    pub journal: Arc<Mutex<Journal>>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            fail_launch: false,
            launch_delay: Duration::ZERO,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn slow(script: Script, launch_delay: Duration) -> Self {
        Self {
            launch_delay,
            ..Self::new(script)
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_launch: true,
            ..Self::new(Script::new())
        }
    }

    pub fn launches(&self) -> usize {
        self.journal.lock().launches.len()
    }

    pub fn workdirs(&self) -> Vec<PathBuf> {
        self.journal
            .lock()
            .launches
            .iter()
            .map(|l| l.workdir.clone())
            .collect()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, options: LaunchOptions) -> EngineResult<Box<dyn PageDriver>> {
        tokio::time::sleep(self.launch_delay).await;
        if self.fail_launch {
            return Err(EngineError::DriverUnavailable(
                "Executable doesn't exist at /ms-playwright/chromium".into(),
            ));
        }
        let viewport = options.viewport;
        self.journal.lock().launches.push(options);
        Ok(Box::new(FakePage {
            script: self.script.clone(),
            viewport,
            url: String::new(),
            journal: Arc::clone(&self.journal),
        }))
    }
}

pub struct FakePage {
    script: Script,
    viewport: Viewport,
    url: String,
    journal: Arc<Mutex<Journal>>,
}

impl FakePage {
    async fn op(&mut self, call: String) {
        self.journal.lock().calls.push(call);
        tokio::time::sleep(self.script.latency).await;
    }

    fn testid(selector: &str) -> String {
        // Reverse of testid_selector for plain ids
        selector
            .trim_start_matches("[data-testid=\"")
            .trim_end_matches("\"]")
            .to_string()
    }

    fn require(&self, selector: &str) -> EngineResult<String> {
        let testid = Self::testid(selector);
        assert_eq!(testid_selector(&testid), selector, "selector must be testid-wrapped");
        if self.script.present.contains(&testid) {
            Ok(testid)
        } else {
            Err(EngineError::Timeout(format!(
                "Timeout 5000ms exceeded waiting for {}",
                selector
            )))
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&mut self, url: &str) -> EngineResult<()> {
        self.op(format!("goto {}", url)).await;
        let present = url::Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .map(|p| p.exists())
            .unwrap_or(false);
        self.journal.lock().document_present.push(present);
        self.url = url.to_string();
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> EngineResult<()> {
        self.op(format!("click {}", selector)).await;
        let testid = self.require(selector)?;
        if let Some(effects) = self.script.on_click.get(&testid).cloned() {
            for (target, text) in effects {
                self.script.present.insert(target.clone());
                self.script.texts.insert(target, text);
            }
        }
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> EngineResult<()> {
        self.op(format!("fill {}", selector)).await;
        let testid = self.require(selector)?;
        self.script
            .attrs
            .insert((testid, "value".to_string()), value.to_string());
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> EngineResult<Option<String>> {
        self.op(format!("textContent {}", selector)).await;
        let testid = self.require(selector)?;
        Ok(self.script.texts.get(&testid).cloned())
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> EngineResult<Option<String>> {
        self.op(format!("getAttribute {} {}", selector, name)).await;
        let testid = self.require(selector)?;
        Ok(self.script.attrs.get(&(testid, name.to_string())).cloned())
    }

    async fn current_url(&mut self) -> EngineResult<String> {
        self.op("url".into()).await;
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> EngineResult<String> {
        self.op("title".into()).await;
        Ok(self.script.title.clone())
    }

    async fn wait_for_selector(&mut self, selector: &str) -> EngineResult<()> {
        self.op(format!("waitForSelector {}", selector)).await;
        if self.script.hang_on.as_deref() == Some(Self::testid(selector).as_str()) {
            std::future::pending::<()>().await;
        }
        self.require(selector).map(|_| ())
    }

    async fn wait_for_load(&mut self, state: LoadState) -> EngineResult<()> {
        self.op(format!("waitForLoadState {}", state.as_str())).await;
        Ok(())
    }

    async fn pause(&mut self, duration: Duration) -> EngineResult<()> {
        self.op(format!("pause {}ms", duration.as_millis())).await;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> EngineResult<()> {
        self.op(format!("screenshot fullPage={}", full_page)).await;
        if self.script.fail_screenshot {
            return Err(EngineError::Driver("Target page, context or browser has been closed".into()));
        }
        if self.script.corrupt_screenshot {
            std::fs::write(path, b"not a png")?;
            return Ok(());
        }
        image::RgbaImage::new(self.viewport.width, self.viewport.height).save(path)?;
        Ok(())
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.op("close".into()).await;
        self.journal.lock().closed += 1;
        Ok(())
    }

    fn terminate(&mut self) {
        self.journal.lock().terminated += 1;
    }
}
