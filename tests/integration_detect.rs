//! Integration tests for toolchain detection.
//!
//! External tools are replaced by a runner that answers nothing, so every
//! registry query and tool probe fails the way it does on a machine without
//! the tooling. Windows SDK detection is driven from temporary directories.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wintoolchain_discovery::{
    detect_sdks, Architecture, CommandOutput, CommandRunner, DetectError, DetectOptions,
    DetectionContext, DeviceHandle, IssueId, LaunchOptions, Result, Supported, ToolFamily,
};

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        program: &OsStr,
        _args: &[String],
        _limit: Duration,
    ) -> Result<CommandOutput> {
        self.calls.lock().push(program.to_string_lossy().into_owned());
        Ok(CommandOutput::failed(1, "not available"))
    }
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

fn add_revision(root: &Path, revision: &str) {
    touch(&root.join("Include").join(revision).join("um").join("Windows.h"));
    let platform = root.join("Platforms").join("UAP").join(revision);
    fs::create_dir_all(&platform).unwrap();
    fs::write(
        platform.join("Platform.xml"),
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<ApplicationPlatform name="UAP" friendlyName="Windows 10 ({revision})" version="{revision}">
  <MinimumVisualStudioVersion>15.0.25909.02</MinimumVisualStudioVersion>
</ApplicationPlatform>"#
        ),
    )
    .unwrap();
}

/// A Windows Kits root holding SDK `10` with one revision.
fn mock_kits(revision: &str) -> tempfile::TempDir {
    let kits = tempfile::tempdir().unwrap();
    let root = kits.path().join("10");
    fs::create_dir_all(&root).unwrap();
    fs::write(
        root.join("SDKManifest.xml"),
        r#"<FileList DisplayName="Windows 10 SDK" MinVSVersion="14.0" />"#,
    )
    .unwrap();
    add_revision(&root, revision);
    touch(&root.join("bin").join(revision).join("x64").join("makecert.exe"));
    kits
}

fn context(kits: &Path, options: DetectOptions, runner: Arc<RecordingRunner>) -> DetectionContext {
    DetectionContext::builder()
        .shared_runner(runner)
        .options(DetectOptions {
            vswhere_search_paths: Vec::new(),
            windows_sdk_search_paths: vec![kits.to_string_lossy().into_owned()],
            ..options
        })
        .target_os("windows")
        .build()
}

#[tokio::test]
async fn test_every_operation_rejects_other_platforms() {
    let runner = Arc::new(RecordingRunner::default());
    let ctx = DetectionContext::builder()
        .shared_runner(runner.clone())
        .target_os("linux")
        .build();

    for family in ToolFamily::all() {
        assert!(matches!(
            ctx.detect_family(family, false).await,
            Err(DetectError::UnsupportedPlatform { .. })
        ));
    }
    assert!(ctx.detect(false).await.is_err());
    assert!(ctx.enumerate_devices(false).await.is_err());
    assert!(ctx.launch(None, &LaunchOptions::default()).await.is_err());
    assert!(runner.calls.lock().is_empty());
}

#[test]
fn test_mock_sdk_end_to_end() {
    let kits = mock_kits("10.0.17763.0");
    let sdks = detect_sdks(&kits.path().join("10")).unwrap();
    assert_eq!(sdks.len(), 1);

    let install = sdks.into_iter().next().unwrap().into_install(Supported::Yes);
    let details = install.windows_sdk().unwrap();
    assert_eq!(install.version, "10.0.17763.0");
    assert_eq!(details.major_version, 10);
    assert_eq!(details.name.as_deref(), Some("Windows 10 (10.0.17763.0)"));
    assert_eq!(details.min_vs_version.as_deref(), Some("15.0.25909.02"));

    assert_eq!(details.executables.len(), 3);
    for (exe, per_arch) in &details.executables {
        assert_eq!(per_arch.len(), 4, "{exe} should list every architecture");
        for (arch, path) in per_arch {
            let expected = exe == "makecert" && *arch == Architecture::X64;
            assert_eq!(path.is_some(), expected, "{exe} {arch:?}");
        }
    }
}

#[tokio::test]
async fn test_cache_is_idempotent_until_bypassed() {
    let kits = mock_kits("10.0.17763.0");
    let ctx = context(kits.path(), DetectOptions::default(), Arc::default());

    let first = ctx.windows_sdks(false).await.unwrap();
    assert_eq!(first.selected().unwrap().version, "10.0.17763.0");

    add_revision(&kits.path().join("10"), "10.0.19041.0");

    let cached = ctx.windows_sdks(false).await.unwrap();
    assert_eq!(*first, *cached);

    let fresh = ctx.windows_sdks(true).await.unwrap();
    assert_eq!(fresh.installs.len(), 2);
    assert_eq!(fresh.selected().unwrap().version, "10.0.19041.0");
}

#[tokio::test]
async fn test_preferred_version_wins_over_highest() {
    let kits = mock_kits("10.0.17763.0");
    add_revision(&kits.path().join("10"), "10.0.19041.0");

    let mut options = DetectOptions::default();
    options.windows_sdk.preferred_version = Some("10.0.17763.0".to_string());
    let ctx = context(kits.path(), options, Arc::default());

    let result = ctx.windows_sdks(false).await.unwrap();
    let selected: Vec<_> = result.installs.iter().filter(|i| i.selected).collect();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].version, "10.0.17763.0");
}

#[tokio::test]
async fn test_full_report_without_tooling() {
    let kits = tempfile::tempdir().unwrap();
    let ctx = context(kits.path(), DetectOptions::default(), Arc::default());

    let report = ctx.detect(false).await.unwrap();
    assert!(report.selected_visual_studio().is_none());
    assert!(report.selected_windows_phone_sdk().is_none());
    for family in ToolFamily::all() {
        assert!(report.installs(family).is_empty());
        assert!(report.issues.iter().any(|i| i.id == family.not_installed_issue()));
    }
    assert!(report
        .issues
        .iter()
        .any(|i| i.id == IssueId::WindowsPhonePowershellScriptsDisabled));

    let json = serde_json::to_value(&*report).unwrap();
    assert_eq!(json["detectVersion"], "3.0");
    assert_eq!(json["issues"][0]["type"], "error");
}

#[tokio::test]
async fn test_stop_never_started_handle() {
    let runner = Arc::new(RecordingRunner::default());
    let kits = tempfile::tempdir().unwrap();
    let ctx = context(kits.path(), DetectOptions::default(), runner.clone());

    let mut handle = DeviceHandle::new(
        "8.1",
        "AppDeployCmd.exe".into(),
        1,
        "Emulator 8.1 WVGA 4 inch 512MB",
    );
    ctx.stop(&mut handle).await.unwrap();
    assert!(runner.calls.lock().is_empty());
}
