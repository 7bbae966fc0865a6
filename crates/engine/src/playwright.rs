//! Playwright browser automation
//!
//! Each session is a Node host running [`DRIVER_SCRIPT`], which launches one
//! Chromium instance and then answers page operations over a JSON-lines
//! protocol on stdin/stdout:
//!
//! ```text
//! -> {"id":3,"op":"textContent","selector":"[data-testid=\"headline\"]","timeout":5000}
//! <- {"id":3,"ok":true,"value":"Welcome back"}
//! <- {"id":4,"ok":false,"error":"Timeout 5000ms exceeded","timeout":true}
//! ```
//!
//! The first line the host writes (id 0) reports whether the launch worked.

use async_trait::async_trait;
use mailproof_common::config::BrowserSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::driver::{BrowserLauncher, LaunchOptions, LoadState, PageDriver};
use crate::error::{EngineError, EngineResult};
use crate::process::DriverProcess;

/// Node host for one browser session
pub const DRIVER_SCRIPT: &str = r#"
const readline = require('readline');
const { chromium } = require('playwright');

const config = JSON.parse(process.argv[2]);
const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const failure = (id, error) => ({
  id,
  ok: false,
  error: error && error.message ? error.message : String(error),
  timeout: !!error && error.name === 'TimeoutError',
});

(async () => {
  let browser;
  try {
    browser = await chromium.launch({ headless: config.headless, args: config.args });
  } catch (error) {
    reply(failure(0, error));
    process.exit(1);
  }
  const context = await browser.newContext({ viewport: config.viewport });
  const page = await context.newPage();
  reply({ id: 0, ok: true, value: 'ready' });

  const handlers = {
    goto: (r) => page.goto(r.url, { timeout: r.timeout }).then(() => null),
    click: (r) => page.click(r.selector, { timeout: r.timeout }).then(() => null),
    fill: (r) => page.fill(r.selector, r.value, { timeout: r.timeout }).then(() => null),
    textContent: (r) => page.textContent(r.selector, { timeout: r.timeout }),
    getAttribute: (r) => page.getAttribute(r.selector, r.name, { timeout: r.timeout }),
    url: async () => page.url(),
    title: () => page.title(),
    waitForSelector: (r) => page.waitForSelector(r.selector, { timeout: r.timeout }).then(() => null),
    waitForLoadState: (r) => page.waitForLoadState(r.state, { timeout: r.timeout }).then(() => null),
    waitForTimeout: (r) => page.waitForTimeout(r.ms).then(() => null),
    screenshot: (r) => page.screenshot({ path: r.path, fullPage: r.fullPage, timeout: r.timeout }).then(() => null),
  };

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let request;
    try {
      request = JSON.parse(line);
    } catch (error) {
      continue;
    }
    if (request.op === 'close') {
      await browser.close();
      reply({ id: request.id, ok: true, value: null });
      process.exit(0);
    }
    const handler = handlers[request.op];
    if (!handler) {
      reply(failure(request.id, new Error(`unknown op ${request.op}`)));
      continue;
    }
    try {
      const value = await handler(request);
      reply({ id: request.id, ok: true, value: value === undefined ? null : value });
    } catch (error) {
      reply(failure(request.id, error));
    }
  }
  await browser.close();
})();
"#;

/// Slack added on top of the in-browser timeout before a reply is given up on
const REPLY_SLACK: Duration = Duration::from_secs(2);

/// How long a graceful close may take before the host is killed
const CLOSE_GRACE: Duration = Duration::from_secs(3);

/// Requests understood by [`DRIVER_SCRIPT`]
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum DriverRequest<'a> {
    Goto {
        url: &'a str,
        timeout: u64,
    },
    Click {
        selector: &'a str,
        timeout: u64,
    },
    Fill {
        selector: &'a str,
        value: &'a str,
        timeout: u64,
    },
    TextContent {
        selector: &'a str,
        timeout: u64,
    },
    GetAttribute {
        selector: &'a str,
        name: &'a str,
        timeout: u64,
    },
    Url,
    Title,
    WaitForSelector {
        selector: &'a str,
        timeout: u64,
    },
    WaitForLoadState {
        state: &'static str,
        timeout: u64,
    },
    WaitForTimeout {
        ms: u64,
    },
    Screenshot {
        path: &'a str,
        #[serde(rename = "fullPage")]
        full_page: bool,
        timeout: u64,
    },
    Close,
}

impl DriverRequest<'_> {
    fn op(&self) -> &'static str {
        match self {
            DriverRequest::Goto { .. } => "goto",
            DriverRequest::Click { .. } => "click",
            DriverRequest::Fill { .. } => "fill",
            DriverRequest::TextContent { .. } => "textContent",
            DriverRequest::GetAttribute { .. } => "getAttribute",
            DriverRequest::Url => "url",
            DriverRequest::Title => "title",
            DriverRequest::WaitForSelector { .. } => "waitForSelector",
            DriverRequest::WaitForLoadState { .. } => "waitForLoadState",
            DriverRequest::WaitForTimeout { .. } => "waitForTimeout",
            DriverRequest::Screenshot { .. } => "screenshot",
            DriverRequest::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a DriverRequest<'a>,
}

#[derive(Debug, Deserialize)]
struct DriverResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

impl DriverResponse {
    fn into_result(self, op: &str) -> EngineResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| format!("{} failed", op));
        if self.timeout {
            Err(EngineError::Timeout(message))
        } else {
            Err(EngineError::Driver(message))
        }
    }
}

#[derive(Debug, Serialize)]
struct HostConfig<'a> {
    headless: bool,
    args: &'a [String],
    viewport: mailproof_common::Viewport,
}

/// Launches Playwright-driven Chromium sessions
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    settings: BrowserSettings,
}

impl PlaywrightLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Check that Node can resolve the `playwright` package
    pub fn check_installed(&self) -> EngineResult<()> {
        let mut cmd = StdCommand::new(&self.settings.node_binary);
        cmd.args(["-e", "require.resolve('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(node_path) = &self.settings.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        match cmd.status() {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => Err(EngineError::DriverUnavailable(
                "playwright not found. Install with: npm install playwright && npx playwright install chromium".into(),
            )),
            Err(e) => Err(EngineError::DriverUnavailable(format!(
                "{} not runnable: {}",
                self.settings.node_binary, e
            ))),
        }
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, options: LaunchOptions) -> EngineResult<Box<dyn PageDriver>> {
        let session = PlaywrightSession::launch(&self.settings, &options).await?;
        Ok(Box::new(session))
    }
}

/// One live Playwright page
pub struct PlaywrightSession {
    process: DriverProcess,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    op_timeout: Duration,
}

impl PlaywrightSession {
    /// Start the host in `options.workdir` and wait for the browser to come up
    pub async fn launch(settings: &BrowserSettings, options: &LaunchOptions) -> EngineResult<Self> {
        let script_path = options.workdir.join("driver.js");
        tokio::fs::write(&script_path, DRIVER_SCRIPT).await?;

        let host_config = serde_json::to_string(&HostConfig {
            headless: settings.headless,
            args: &settings.launch_args,
            viewport: options.viewport,
        })?;

        let mut cmd = Command::new(&settings.node_binary);
        cmd.arg(&script_path)
            .arg(host_config)
            .current_dir(&options.workdir);
        if let Some(node_path) = &settings.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let (process, stdin, stdout) = DriverProcess::spawn(cmd)?;
        let mut session = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            op_timeout: settings.op_timeout(),
        };

        match session.read_reply(0, "launch", settings.launch_timeout()).await {
            Ok(_) => {
                info!(
                    "Browser session ready (pid: {:?}, viewport {})",
                    session.process.pid(),
                    options.viewport
                );
                Ok(session)
            }
            Err(e) => {
                session.process.terminate();
                Err(EngineError::DriverUnavailable(e.to_string()))
            }
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.op_timeout.as_millis() as u64
    }

    async fn request(&mut self, request: DriverRequest<'_>) -> EngineResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_string(&Envelope {
            id,
            request: &request,
        })?;
        line.push('\n');

        let op = request.op();
        debug!("driver <- #{} {}", id, op);

        if let Err(e) = self.stdin.write_all(line.as_bytes()).await {
            return Err(self.host_gone(op, e.to_string()));
        }
        if let Err(e) = self.stdin.flush().await {
            return Err(self.host_gone(op, e.to_string()));
        }

        let budget = match &request {
            DriverRequest::WaitForTimeout { ms } => Duration::from_millis(*ms) + self.op_timeout,
            _ => self.op_timeout,
        };
        self.read_reply(id, op, budget + REPLY_SLACK).await
    }

    /// Read lines until the reply for `id` arrives; stale replies are skipped
    async fn read_reply(&mut self, id: u64, op: &str, budget: Duration) -> EngineResult<Value> {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let next = tokio::time::timeout_at(deadline, self.stdout.next_line())
                .await
                .map_err(|_| {
                    EngineError::Timeout(format!("driver gave no reply to {} within {:?}", op, budget))
                })?;

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => return Err(self.host_gone(op, "driver exited".into())),
                Err(e) => return Err(self.host_gone(op, e.to_string())),
            };

            let response: DriverResponse = match serde_json::from_str(&line) {
                Ok(response) => response,
                Err(_) => {
                    debug!("driver -> (non-protocol) {}", line);
                    continue;
                }
            };

            if response.id != id {
                debug!("Skipping stale reply #{} while waiting for #{}", response.id, id);
                continue;
            }
            return response.into_result(op);
        }
    }

    fn host_gone(&self, op: &str, reason: String) -> EngineError {
        let tail = self.process.stderr_tail();
        if tail.is_empty() {
            EngineError::Driver(format!("{} during {}", reason, op))
        } else {
            EngineError::Driver(format!("{} during {}: {}", reason, op, tail))
        }
    }
}

fn optional_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

#[async_trait]
impl PageDriver for PlaywrightSession {
    async fn goto(&mut self, url: &str) -> EngineResult<()> {
        let timeout = self.timeout_ms();
        self.request(DriverRequest::Goto { url, timeout }).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> EngineResult<()> {
        let timeout = self.timeout_ms();
        self.request(DriverRequest::Click { selector, timeout }).await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> EngineResult<()> {
        let timeout = self.timeout_ms();
        self.request(DriverRequest::Fill {
            selector,
            value,
            timeout,
        })
        .await?;
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> EngineResult<Option<String>> {
        let timeout = self.timeout_ms();
        let value = self
            .request(DriverRequest::TextContent { selector, timeout })
            .await?;
        Ok(optional_string(value))
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> EngineResult<Option<String>> {
        let timeout = self.timeout_ms();
        let value = self
            .request(DriverRequest::GetAttribute {
                selector,
                name,
                timeout,
            })
            .await?;
        Ok(optional_string(value))
    }

    async fn current_url(&mut self) -> EngineResult<String> {
        let value = self.request(DriverRequest::Url).await?;
        Ok(optional_string(value).unwrap_or_default())
    }

    async fn title(&mut self) -> EngineResult<String> {
        let value = self.request(DriverRequest::Title).await?;
        Ok(optional_string(value).unwrap_or_default())
    }

    async fn wait_for_selector(&mut self, selector: &str) -> EngineResult<()> {
        let timeout = self.timeout_ms();
        self.request(DriverRequest::WaitForSelector { selector, timeout })
            .await?;
        Ok(())
    }

    async fn wait_for_load(&mut self, state: LoadState) -> EngineResult<()> {
        let timeout = self.timeout_ms();
        self.request(DriverRequest::WaitForLoadState {
            state: state.as_str(),
            timeout,
        })
        .await?;
        Ok(())
    }

    async fn pause(&mut self, duration: Duration) -> EngineResult<()> {
        self.request(DriverRequest::WaitForTimeout {
            ms: duration.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> EngineResult<()> {
        let timeout = self.timeout_ms();
        let path = path.to_string_lossy();
        self.request(DriverRequest::Screenshot {
            path: &path,
            full_page,
            timeout,
        })
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> EngineResult<()> {
        let result = self.request(DriverRequest::Close).await;
        if let Err(e) = &result {
            warn!("Graceful browser close failed: {}", e);
        }
        self.process.shutdown(CLOSE_GRACE).await;
        result.map(|_| ())
    }

    fn terminate(&mut self) {
        self.process.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_shape() {
        let request = DriverRequest::GetAttribute {
            selector: "[data-testid=\"cta\"]",
            name: "href",
            timeout: 5000,
        };
        let json = serde_json::to_value(Envelope {
            id: 7,
            request: &request,
        })
        .unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["op"], "getAttribute");
        assert_eq!(json["selector"], "[data-testid=\"cta\"]");
        assert_eq!(json["name"], "href");
        assert_eq!(json["timeout"], 5000);
    }

    #[test]
    fn test_screenshot_uses_full_page_key() {
        let request = DriverRequest::Screenshot {
            path: "/tmp/x.png",
            full_page: true,
            timeout: 100,
        };
        let json = serde_json::to_value(Envelope {
            id: 1,
            request: &request,
        })
        .unwrap();
        assert_eq!(json["op"], "screenshot");
        assert_eq!(json["fullPage"], true);
        assert_eq!(request.op(), "screenshot");
    }

    #[test]
    fn test_response_timeout_flag_maps_to_timeout() {
        let response: DriverResponse = serde_json::from_str(
            r#"{"id":3,"ok":false,"error":"Timeout 5000ms exceeded","timeout":true}"#,
        )
        .unwrap();
        assert!(response.into_result("click").unwrap_err().is_timeout());

        let response: DriverResponse =
            serde_json::from_str(r#"{"id":3,"ok":false,"error":"detached"}"#).unwrap();
        assert!(matches!(
            response.into_result("click"),
            Err(EngineError::Driver(_))
        ));

        let response: DriverResponse =
            serde_json::from_str(r#"{"id":4,"ok":true,"value":"Welcome"}"#).unwrap();
        assert_eq!(response.into_result("title").unwrap(), "Welcome");
    }

    #[test]
    fn test_null_value_is_absent() {
        assert_eq!(optional_string(Value::Null), None);
        assert_eq!(optional_string(Value::String("x".into())), Some("x".into()));
    }

    #[tokio::test]
    async fn test_launch_without_node_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = BrowserSettings {
            node_binary: "/nonexistent/node".into(),
            ..Default::default()
        };
        let options = LaunchOptions {
            viewport: mailproof_common::Viewport::THUMBNAIL,
            workdir: dir.path().to_path_buf(),
        };

        let err = PlaywrightSession::launch(&settings, &options).await.err().unwrap();
        assert!(matches!(err, EngineError::DriverUnavailable(_)));
    }
}
