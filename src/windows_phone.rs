//! Windows Phone SDK detection.

use crate::context::DetectionContext;
use crate::detection::{registry, selector, version};
use crate::issue::{record_issue, Issue, IssueId};
use crate::tool_install::{DetectionResult, InstallDetails, ToolInstall, WindowsPhoneSdkDetails};
use crate::{Result, ToolFamily};
use futures::future::try_join_all;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Registry keys whose `v<major>.<minor>` subkeys describe installed SDKs.
pub const REGISTRY_KEYS: [&str; 2] = [
    r"HKEY_LOCAL_MACHINE\Software\Microsoft\Microsoft SDKs\WindowsPhone",
    r"HKEY_LOCAL_MACHINE\Software\Wow6432Node\Microsoft\Microsoft SDKs\WindowsPhone",
];

fn version_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\v(\d+\.\d+)$").expect("Invalid SDK key regex"))
}

/// The deploy tool of an SDK install: `XapDeployCmd.exe` for 8.0,
/// `AppDeployCmd.exe` for 8.1.
pub fn find_deploy_cmd(install_path: &Path) -> Option<PathBuf> {
    let tools = install_path.join("Tools");
    [
        tools.join("XAP Deployment").join("XapDeployCmd.exe"),
        tools.join("AppDeploy").join("AppDeployCmd.exe"),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}

async fn validate(
    ctx: &DetectionContext,
    version: String,
    key: String,
) -> Result<Option<ToolInstall>> {
    let install_key = format!(r"{key}\Install Path");
    let Some(path) = registry::get_value(ctx.runner(), &install_key, "Install Path", ctx.timeout())
        .await?
        .filter(|path| !path.is_empty())
    else {
        tracing::debug!(%key, "no install path, discarding");
        return Ok(None);
    };
    let path = PathBuf::from(path);
    let deploy_cmd = find_deploy_cmd(&path);

    let range = ctx.options().windows_phone.supported_range.as_deref();
    Ok(Some(ToolInstall {
        family: ToolFamily::WindowsPhoneSdk,
        supported: version::satisfies(&version, range, false),
        version,
        path,
        selected: false,
        details: InstallDetails::WindowsPhoneSdk(WindowsPhoneSdkDetails {
            registry_key: key,
            deploy_cmd,
        }),
    }))
}

pub(crate) async fn detect(ctx: &DetectionContext) -> Result<DetectionResult> {
    let listings = try_join_all(
        REGISTRY_KEYS
            .iter()
            .map(|key| registry::list_subkeys(ctx.runner(), key, ctx.timeout())),
    )
    .await?;

    let mut candidates: Vec<(String, String)> = Vec::new();
    for subkey in listings.into_iter().flatten() {
        if let Some(caps) = version_key().captures(&subkey) {
            candidates.push((caps[1].to_string(), subkey));
        }
    }

    let validated = try_join_all(
        candidates
            .into_iter()
            .map(|(version, key)| validate(ctx, version, key)),
    )
    .await?;

    let mut result = DetectionResult::new(ToolFamily::WindowsPhoneSdk);
    for install in validated.into_iter().flatten() {
        result.push_install(install);
    }

    if result.installs.is_empty() {
        record_issue(
            &mut result.issues,
            Issue::error(ToolFamily::WindowsPhoneSdk.not_installed_issue()),
        );
    } else if result
        .installs
        .iter()
        .all(|install| install.windows_phone_sdk().and_then(|d| d.deploy_cmd.as_ref()).is_none())
    {
        record_issue(
            &mut result.issues,
            Issue::error(IssueId::WindowsPhoneSdkMissingDeployCmd),
        );
    }

    let preferred = ctx.options().windows_phone.preferred_version.as_deref();
    selector::select(&mut result.installs, preferred);

    tracing::info!(
        found = result.installs.len(),
        selected = ?result.selected().map(|i| i.version.as_str()),
        "Windows Phone SDK detection finished"
    );
    Ok(result)
}
