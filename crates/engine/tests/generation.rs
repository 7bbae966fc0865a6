//! Generation and capture tests against the scripted browser

mod support;

use std::sync::Arc;

use mailproof_common::config::GenerationSettings;
use mailproof_common::{ArtifactSink, ArtifactStore, CopyEntry, MemorySink, ProjectBundle, Template, Viewport};
use mailproof_engine::{CaptureKind, Generator, ScreenshotCapturer};
use tempfile::TempDir;

use support::{FakeLauncher, Script};

async fn capturer(launcher: &FakeLauncher, root: &TempDir) -> ScreenshotCapturer {
    let store = ArtifactStore::new(root.path()).await.unwrap();
    ScreenshotCapturer::new(Arc::new(launcher.clone()), store, GenerationSettings::default())
}

fn bundle() -> ProjectBundle {
    ProjectBundle {
        templates: vec![
            Template::new("welcome", "<h1>{{ headline }}</h1><a href=\"{{ cta-url }}\">Go</a>"),
            Template::new("receipt", "<p>{{ total }}</p>"),
        ],
        copy: vec![
            CopyEntry::new("welcome", "en", "headline", "Welcome"),
            CopyEntry::new("welcome", "en", "cta-url", "https://example.com"),
            CopyEntry::new("welcome", "de-AT", "headline", "Servus"),
            CopyEntry::new("receipt", "fr", "total", "10 €"),
            CopyEntry::new("receipt", "it", "subtotal", "5 €"),
        ],
    }
}

#[tokio::test]
async fn thumbnail_uses_thumbnail_viewport_and_digest() {
    let root = TempDir::new().unwrap();
    let launcher = FakeLauncher::new(Script::new());
    let capturer = capturer(&launcher, &root).await;

    let artifact = capturer.capture("<p>Hi</p>", &CaptureKind::Thumbnail).await.unwrap();

    assert_eq!((artifact.width, artifact.height), (600, 800));
    assert!(artifact.relative_path.starts_with("screenshots/"));
    let path = capturer.store().absolute(&artifact.relative_path);
    assert_eq!(artifact.sha256, ArtifactStore::hash_file(&path).await.unwrap());

    let journal = launcher.journal.lock();
    assert_eq!(journal.launches[0].viewport, Viewport::THUMBNAIL);
    assert_eq!(journal.document_present, vec![true]);
    assert!(journal.calls.iter().any(|c| c == "screenshot fullPage=true"));
    assert!(!journal.calls.iter().any(|c| c.starts_with("pause")));
    assert!(!journal.launches[0].workdir.exists());
}

#[tokio::test]
async fn template_preview_is_reused_until_deleted() {
    let root = TempDir::new().unwrap();
    let launcher = FakeLauncher::new(Script::new());
    let capturer = capturer(&launcher, &root).await;
    let template = Template::new("42", "<p>{{ body }}</p>");

    let first = capturer.template_preview(&template).await.unwrap();
    assert!(first.relative_path.starts_with("screenshots/template_42_"));
    assert_eq!((first.width, first.height), (800, 600));
    assert!(launcher
        .journal
        .lock()
        .calls
        .iter()
        .any(|c| c == "pause 1000ms"));

    let second = capturer.template_preview(&template).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(launcher.launches(), 1);

    assert_eq!(capturer.delete_previews("42").await.unwrap(), 1);
    let third = capturer.refresh_preview(&template).await.unwrap();
    assert_ne!(third.relative_path, first.relative_path);
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn batch_records_thumbnails_and_skips_uncovered_locales() {
    let root = TempDir::new().unwrap();
    let launcher = FakeLauncher::new(Script::new());
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(sink.clone(), Some(capturer(&launcher, &root).await));

    let report = generator.generate(&bundle()).await.unwrap();

    // welcome: de-AT (en fills cta-url) and en; receipt: fr only
    assert_eq!(report.generated, 3);
    assert_eq!(report.capture_failures, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].locale, "it");
    assert_eq!(report.skipped[0].missing, vec!["total".to_string()]);

    let welcome = sink.emails_for_template("welcome").unwrap();
    let at = welcome.iter().find(|e| e.locale == "de-AT").unwrap();
    assert_eq!(at.html, "<h1>Servus</h1><a href=\"https://example.com\">Go</a>");
    assert!(at.screenshot.as_deref().unwrap().starts_with("screenshots/"));
    assert!(report.artifacts.iter().all(|a| a.thumbnail.is_some()));
}

#[tokio::test]
async fn capture_failure_keeps_email_without_thumbnail() {
    let root = TempDir::new().unwrap();
    let launcher = FakeLauncher::new(Script::new().fail_screenshot());
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(sink.clone(), Some(capturer(&launcher, &root).await));

    let report = generator.generate(&bundle()).await.unwrap();

    assert_eq!(report.generated, 3);
    assert_eq!(report.capture_failures, 3);
    assert!(sink.emails().iter().all(|e| e.screenshot.is_none()));
    assert_eq!(launcher.journal.lock().terminated, 3);
}

#[tokio::test]
async fn unreadable_screenshot_is_not_left_on_disk() {
    let root = TempDir::new().unwrap();
    let launcher = FakeLauncher::new(Script::new().corrupt_screenshot());
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(sink.clone(), Some(capturer(&launcher, &root).await));

    let report = generator.generate(&bundle()).await.unwrap();

    assert_eq!(report.generated, 3);
    assert_eq!(report.capture_failures, 3);
    assert!(sink.emails().iter().all(|e| e.screenshot.is_none()));
    let left: Vec<_> = walkdir::WalkDir::new(root.path().join("screenshots"))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .collect();
    assert!(left.is_empty(), "{:?}", left);
}

#[tokio::test]
async fn unavailable_browser_does_not_abort_batch() {
    let root = TempDir::new().unwrap();
    let launcher = FakeLauncher::unavailable();
    let sink = Arc::new(MemorySink::new());
    let generator = Generator::new(sink.clone(), Some(capturer(&launcher, &root).await));

    let report = generator.generate(&bundle()).await.unwrap();
    assert_eq!(report.generated, 3);
    assert_eq!(report.capture_failures, 3);
}
