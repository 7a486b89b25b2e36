//! Host environment checks: operating system, MSBuild and PowerShell.
//!
//! Each check produces a partial [`Report`]. Expected failures (a missing
//! tool, a non-zero exit) become defaults or issues; only timeouts
//! propagate.

use crate::context::DetectionContext;
use crate::detection::version;
use crate::issue::{record_issue, Issue, IssueId};
use crate::report::Report;
use crate::runner::CommandOutput;
use crate::tool_install::ToolInstall;
use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Oldest MSBuild that can build Windows Phone and Store apps.
pub const MIN_MSBUILD_VERSION: &str = ">=4.0";

/// Execution policies under which PowerShell refuses unsigned scripts.
const BLOCKING_POLICIES: [&str; 2] = ["Restricted", "AllSigned"];

fn wide_gap() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").expect("Invalid column regex"))
}

fn blank_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("Invalid blank line regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

impl Default for OsInfo {
    fn default() -> Self {
        Self {
            name: "Windows".to_string(),
            version: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsBuildInfo {
    pub version: String,
    /// The MSBuild executable, when it was run directly rather than through
    /// `vcvarsall.bat`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerShellInfo {
    /// Whether unsigned local scripts may run.
    pub enabled: bool,
    pub execution_policy: Option<String>,
}

/// Parses `wmic os get Caption,Version`. Missing columns keep their
/// defaults.
pub(crate) fn parse_wmic(output: &str) -> OsInfo {
    let mut info = OsInfo::default();
    let Some(line) = output.split('\n').nth(1) else {
        return info;
    };
    let mut columns = wide_gap().split(line.trim());
    if let Some(name) = columns.next().map(str::trim).filter(|s| !s.is_empty()) {
        info.name = name.to_string();
    }
    if let Some(version) = columns.next().map(str::trim).filter(|s| !s.is_empty()) {
        info.version = version.to_string();
    }
    info
}

/// Extracts the version from `MSBuild /version` output.
///
/// Run through `vcvarsall.bat`, the environment banner comes first and the
/// version is the last line of the second paragraph. Run directly, it is the
/// last line.
pub(crate) fn parse_msbuild_version(output: &str) -> Option<String> {
    let looks_like_version = |line: &&str| !version::components(line).is_empty();
    let trimmed = output.trim();

    let from_chunk = blank_line()
        .split(trimmed)
        .nth(1)
        .and_then(|chunk| chunk.lines().map(str::trim).last())
        .filter(looks_like_version);

    from_chunk
        .or_else(|| {
            trimmed
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .last()
                .filter(looks_like_version)
        })
        .map(String::from)
}

/// Issue for an MSBuild older than [`MIN_MSBUILD_VERSION`].
fn msbuild_too_old(found: &str) -> Issue {
    Issue::error(IssueId::WindowsMsbuildTooOld).with_message(format!(
        "The MSBuild version {found} is too old.\n\
         .NET MSBuild '{MIN_MSBUILD_VERSION}' is required.\n\
         Please install the latest .NET framework."
    ))
}

/// Reads the operating system name and version.
pub(crate) async fn check_os(ctx: &DetectionContext) -> Result<Report> {
    let args = vec!["os".to_string(), "get".to_string(), "Caption,Version".to_string()];
    let os = match ctx.runner().run(OsStr::new("wmic"), &args, ctx.timeout()).await {
        Ok(output) if output.success() => parse_wmic(&output.stdout),
        Err(e) if e.is_timeout() => return Err(e),
        other => {
            tracing::debug!(result = ?other.map(|o| o.code), "wmic unavailable, using defaults");
            OsInfo::default()
        }
    };
    Ok(Report {
        os: Some(os),
        ..Default::default()
    })
}

/// Runs `MSBuild /version` in the environment of `visual_studio`.
///
/// Prefers `vcvarsall.bat`; falls back to the MSBuild path vswhere
/// reported. An install offering neither yields an empty report.
pub(crate) async fn check_msbuild(
    ctx: &DetectionContext,
    visual_studio: Option<&ToolInstall>,
) -> Result<Report> {
    let mut report = Report::default();
    let Some(details) = visual_studio.and_then(ToolInstall::visual_studio) else {
        return Ok(report);
    };

    let (program, args, path): (PathBuf, Vec<String>, Option<PathBuf>) =
        match (&details.vcvarsall, &details.msbuild) {
            (Some(vcvarsall), _) => (
                PathBuf::from("cmd"),
                vec![
                    "/C".to_string(),
                    "call".to_string(),
                    vcvarsall.to_string_lossy().into_owned(),
                    "&&".to_string(),
                    "MSBuild".to_string(),
                    "/version".to_string(),
                ],
                None,
            ),
            (None, Some(msbuild)) => (
                msbuild.clone(),
                vec!["/version".to_string()],
                Some(msbuild.clone()),
            ),
            (None, None) => {
                tracing::debug!("selected Visual Studio has no vcvarsall.bat or MSBuild");
                return Ok(report);
            }
        };

    let output = match ctx.runner().run(program.as_os_str(), &args, ctx.timeout()).await {
        Ok(output) => output,
        Err(e) if e.is_timeout() => return Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "failed to run MSBuild");
            CommandOutput::failed(-1, e.to_string())
        }
    };

    let version = output
        .success()
        .then(|| parse_msbuild_version(&output.stdout))
        .flatten();
    let Some(version) = version else {
        tracing::warn!(code = ?output.code, "MSBuild did not report a version");
        record_issue(&mut report.issues, Issue::error(IssueId::WindowsMsbuildError));
        return Ok(report);
    };

    if !version::satisfies(&version, Some(MIN_MSBUILD_VERSION), false).is_compatible() {
        record_issue(&mut report.issues, msbuild_too_old(&version));
    }
    tracing::info!(%version, "found MSBuild");
    report.msbuild = Some(MsBuildInfo { version, path });
    Ok(report)
}

/// Checks whether PowerShell will run unsigned local scripts.
pub(crate) async fn check_powershell(ctx: &DetectionContext) -> Result<Report> {
    let args: Vec<String> = ["-NoProfile", "-NonInteractive", "-Command", "Get-ExecutionPolicy"]
        .into_iter()
        .map(String::from)
        .collect();

    let policy = match ctx
        .runner()
        .run(ctx.options().powershell.as_os_str(), &args, ctx.timeout())
        .await
    {
        Ok(output) if output.success() => output
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(String::from),
        Err(e) if e.is_timeout() => return Err(e),
        other => {
            tracing::warn!(
                result = ?other.map(|o| o.code),
                "could not query PowerShell execution policy"
            );
            None
        }
    };

    let enabled = policy.as_deref().is_some_and(|policy| {
        !BLOCKING_POLICIES
            .iter()
            .any(|blocking| policy.eq_ignore_ascii_case(blocking))
    });

    let mut report = Report::default();
    if !enabled {
        record_issue(
            &mut report.issues,
            Issue::error(IssueId::WindowsPhonePowershellScriptsDisabled),
        );
    }
    report.powershell = Some(PowerShellInfo {
        enabled,
        execution_policy: policy,
    });
    Ok(report)
}
