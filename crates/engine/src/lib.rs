//! mailproof engine
//!
//! This crate renders localized emails and verifies HTML documents in a
//! headless browser:
//! - Resolves which locales a template's copy can satisfy and renders them
//! - Captures thumbnails and template previews through Playwright
//! - Runs scripted scenarios (`data-testid` steps) with a hard time budget
//! - Checks generated emails inline against their static DOM
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     mailproof engine                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Generator                                                  │
//! │    ├── locale::resolve(placeholders, locale, copy)          │
//! │    ├── render(template, values) -> html                     │
//! │    └── ScreenshotCapturer::capture(html) -> artifact        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── BrowserLauncher::launch() -> Box<dyn PageDriver>     │
//! │    ├── Interpreter: Idle → Loaded → Running(i) → terminal   │
//! │    ├── failure screenshot (best effort)                     │
//! │    └── ArtifactSink::record_result(result)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightSession (Node host, JSON lines on stdio)         │
//! │    └── DriverProcess: own process group, SIGTERM → SIGKILL  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assert;
pub mod capture;
pub mod driver;
pub mod error;
pub mod generate;
pub mod inline;
pub mod interpreter;
pub mod playwright;
pub mod process;
pub mod runner;
pub mod selector;
pub mod spec;

pub use capture::{CaptureKind, ScreenshotArtifact, ScreenshotCapturer};
pub use driver::{BrowserLauncher, LaunchOptions, LoadState, PageDriver};
pub use error::{EngineError, EngineResult};
pub use generate::{GenerationReport, Generator};
pub use inline::{InlineReport, InlineStep};
pub use interpreter::{Action, Interpreter, RunState, StepFailure, Transcript};
pub use playwright::{PlaywrightLauncher, PlaywrightSession};
pub use runner::{ScenarioRunner, SuiteSummary};
pub use spec::{LoadedScenario, ScenarioFile};
