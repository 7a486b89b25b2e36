//! Visual Studio detection.
//!
//! Two sources feed one result: the registry (`<major>.<minor>_Config`
//! keys written by Visual Studio 2010 through 2015) and vswhere (2017 and
//! later). Installs are keyed by version; when both sources report the same
//! version the registry entry, scanned first, is kept.

use crate::context::DetectionContext;
use crate::detection::registry::{self, RegValue};
use crate::detection::{selector, version};
use crate::issue::{record_issue, Issue};
use crate::tool_install::{DetectionResult, InstallDetails, ToolInstall, VisualStudioDetails};
use crate::vswhere::{QueryOptions, VsInstance};
use crate::{DetectError, Result, ToolFamily};
use futures::future::{try_join, try_join_all};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Registry keys whose subkeys are scanned for `_Config` entries.
pub const REGISTRY_KEYS: [&str; 3] = [
    r"HKEY_LOCAL_MACHINE\Software\Microsoft\VisualStudio",
    r"HKEY_LOCAL_MACHINE\Software\Wow6432Node\Microsoft\VisualStudio",
    r"HKEY_CURRENT_USER\Software\Microsoft\VisualStudio",
];

fn config_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\\(\d+\.\d+)_config$").expect("Invalid config key regex"))
}

fn wpsdk_dir_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^wp(\d+)$").expect("Invalid WPSDK regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    version: String,
    key: String,
}

/// Scans both sources, validates, and selects.
pub(crate) async fn detect(ctx: &DetectionContext, force: bool) -> Result<DetectionResult> {
    let (from_registry, from_vswhere) =
        try_join(scan_registry(ctx), scan_vswhere(ctx, force)).await?;

    let mut result = DetectionResult::new(ToolFamily::VisualStudio);
    for install in from_registry.into_iter().chain(from_vswhere) {
        if !result.push_install(install) {
            tracing::debug!("duplicate Visual Studio version ignored");
        }
    }

    if result.installs.is_empty() {
        record_issue(
            &mut result.issues,
            Issue::error(ToolFamily::VisualStudio.not_installed_issue()),
        );
    }

    let preferred = ctx.options().visual_studio.preferred_version.as_deref();
    selector::select(&mut result.installs, preferred);

    tracing::info!(
        found = result.installs.len(),
        selected = ?result.selected().map(|i| i.version.as_str()),
        "Visual Studio detection finished"
    );
    Ok(result)
}

async fn scan_registry(ctx: &DetectionContext) -> Result<Vec<ToolInstall>> {
    let listings = try_join_all(
        REGISTRY_KEYS
            .iter()
            .map(|key| registry::list_subkeys(ctx.runner(), key, ctx.timeout())),
    )
    .await?;

    let mut candidates: Vec<Candidate> = Vec::new();
    for subkey in listings.into_iter().flatten() {
        let Some(caps) = config_key().captures(&subkey) else {
            continue;
        };
        if candidates.iter().any(|c| c.key.eq_ignore_ascii_case(&subkey)) {
            continue;
        }
        candidates.push(Candidate {
            version: caps[1].to_string(),
            key: subkey,
        });
    }
    tracing::debug!(count = candidates.len(), "Visual Studio registry candidates");

    let validated = try_join_all(
        candidates
            .into_iter()
            .map(|candidate| validate_registry_candidate(ctx, candidate)),
    )
    .await?;
    Ok(validated.into_iter().flatten().collect())
}

async fn validate_registry_candidate(
    ctx: &DetectionContext,
    candidate: Candidate,
) -> Result<Option<ToolInstall>> {
    let Some(values) = registry::query_values(ctx.runner(), &candidate.key, ctx.timeout()).await?
    else {
        return Ok(None);
    };

    let value = |name: &str| -> Option<String> {
        values
            .iter()
            .find(|v: &&RegValue| v.name == name)
            .map(|v| v.data.clone())
            .filter(|data| !data.is_empty())
    };

    let Some(shell_folder) = value("ShellFolder") else {
        tracing::debug!(key = %candidate.key, "no ShellFolder value");
        return Ok(None);
    };
    let path = PathBuf::from(shell_folder);

    let mut details = match inspect_install_dir(&path) {
        Ok(details) => details,
        Err(e) => {
            tracing::debug!(key = %candidate.key, error = %e, "discarding Visual Studio candidate");
            return Ok(None);
        }
    };
    details.registry_key = Some(candidate.key.clone());
    details.clr_version = value("CLR Version");
    details.complete = true;

    let range = ctx.options().visual_studio.supported_range.as_deref();
    Ok(Some(ToolInstall {
        family: ToolFamily::VisualStudio,
        supported: version::satisfies(&candidate.version, range, true),
        version: candidate.version,
        path,
        selected: false,
        details: InstallDetails::VisualStudio(details),
    }))
}

/// Checks that `path` holds a Visual Studio install and collects its build
/// scripts and Windows Phone sub-SDKs.
pub(crate) fn inspect_install_dir(path: &Path) -> Result<VisualStudioDetails> {
    let devenv = path.join("Common7").join("IDE").join("devenv.exe");
    if !devenv.is_file() {
        return Err(DetectError::invalid_install(format!(
            "Unable to find \"devenv.exe\" in \"{}\"",
            path.display()
        )));
    }

    let vc = path.join("VC");
    let vcvarsall = [
        vc.join("vcvarsall.bat"),
        vc.join("Auxiliary").join("Build").join("vcvarsall.bat"),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file());

    let vsdevcmd = Some(path.join("Common7").join("Tools").join("VsDevCmd.bat"))
        .filter(|p| p.is_file());

    Ok(VisualStudioDetails {
        vcvarsall,
        vsdevcmd,
        wpsdk: find_phone_sdks(&vc.join("WPSDK")),
        ..Default::default()
    })
}

/// `VC\WPSDK\wp80\vcvarsphoneall.bat` → `"8.0"`.
fn find_phone_sdks(dir: &Path) -> BTreeMap<String, PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return BTreeMap::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let number: u32 = wpsdk_dir_name().captures(&name)?[1].parse().ok()?;
            let script = entry.path().join("vcvarsphoneall.bat");
            script
                .is_file()
                .then(|| (format!("{:.1}", f64::from(number) / 10.0), script))
        })
        .collect()
}

async fn scan_vswhere(ctx: &DetectionContext, force: bool) -> Result<Vec<ToolInstall>> {
    let Some(vswhere) = ctx.vswhere(force).await? else {
        tracing::debug!("vswhere not found");
        return Ok(Vec::new());
    };

    let instances = match vswhere
        .instances(ctx.runner(), &QueryOptions::default(), ctx.timeout())
        .await
    {
        Ok(instances) => instances,
        Err(e @ (DetectError::ToolFailed { .. } | DetectError::Json { .. })) => {
            tracing::warn!(error = %e, "vswhere query failed");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let include_incomplete = ctx.options().include_incomplete;
    let mut installs = Vec::new();
    for instance in instances {
        if !instance.is_complete && !include_incomplete {
            tracing::debug!(
                version = %instance.installation_version,
                "skipping incomplete instance"
            );
            continue;
        }
        let msbuild = match vswhere
            .find_msbuild(ctx.runner(), &instance.installation_version, ctx.timeout())
            .await
        {
            Ok(found) => found,
            Err(e) if e.is_timeout() => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "MSBuild lookup failed");
                None
            }
        };
        installs.push(from_instance(ctx, instance, msbuild));
    }
    Ok(installs)
}

fn from_instance(
    ctx: &DetectionContext,
    instance: VsInstance,
    msbuild: Option<PathBuf>,
) -> ToolInstall {
    let path = instance.installation_path;
    let vc = path.join("VC");
    let vcvarsall = Some(vc.join("Auxiliary").join("Build").join("vcvarsall.bat"))
        .filter(|p| p.is_file());

    let details = VisualStudioDetails {
        name: Some(instance.display_name),
        product_id: instance.product_id,
        complete: instance.is_complete,
        vcvarsall,
        vsdevcmd: Some(path.join("Common7").join("Tools").join("VsDevCmd.bat")),
        msbuild,
        ..Default::default()
    };

    let range = ctx.options().visual_studio.supported_range.as_deref();
    ToolInstall {
        family: ToolFamily::VisualStudio,
        supported: version::satisfies(&instance.installation_version, range, true),
        version: instance.installation_version,
        path,
        selected: false,
        details: InstallDetails::VisualStudio(details),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueId;
    use crate::runner::testing::ScriptedRunner;
    use crate::runner::CommandOutput;
    use crate::tool_install::Supported;
    use crate::DetectOptions;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn fake_vs(root: &Path) {
        touch(&root.join("Common7").join("IDE").join("devenv.exe"));
        touch(&root.join("VC").join("vcvarsall.bat"));
        touch(&root.join("VC").join("WPSDK").join("wp80").join("vcvarsphoneall.bat"));
        touch(&root.join("VC").join("WPSDK").join("wp81").join("vcvarsphoneall.bat"));
        fs::create_dir_all(root.join("VC").join("WPSDK").join("wp90")).unwrap();
    }

    fn context(runner: ScriptedRunner, options: DetectOptions) -> DetectionContext {
        DetectionContext::builder()
            .runner(runner)
            .options(options)
            .target_os("windows")
            .build()
    }

    fn no_vswhere() -> DetectOptions {
        DetectOptions {
            vswhere_search_paths: Vec::new(),
            ..Default::default()
        }
    }

    #[test]
    fn test_inspect_install_dir() {
        let dir = tempfile::tempdir().unwrap();
        fake_vs(dir.path());

        let details = inspect_install_dir(dir.path()).unwrap();
        assert_eq!(details.vcvarsall, Some(dir.path().join("VC").join("vcvarsall.bat")));
        assert_eq!(
            details.wpsdk.keys().collect::<Vec<_>>(),
            vec!["8.0", "8.1"]
        );
    }

    #[test]
    fn test_inspect_requires_devenv() {
        let dir = tempfile::tempdir().unwrap();
        let error = inspect_install_dir(dir.path()).unwrap_err();
        assert!(matches!(error, DetectError::InvalidInstall { .. }));
    }

    fn config_subkey(version: &str) -> String {
        format!("{}\\{version}_Config", REGISTRY_KEYS[1])
    }

    #[tokio::test]
    async fn test_registry_scan_validates_and_selects() {
        let vs12 = tempfile::tempdir().unwrap();
        fake_vs(vs12.path());
        let vs12_path = vs12.path().to_string_lossy().into_owned();

        let listing = format!(
            "\r\n{root}\r\n{root}\\11.0_Config\r\n{root}\\12.0_Config\r\n{root}\\VSTA\r\n",
            root = REGISTRY_KEYS[1]
        );
        let values_12 = format!(
            "\r\n{}\\12.0_Config\r\n    \
             CLR Version    REG_SZ    v4.0.30319\r\n    \
             ShellFolder    REG_SZ    {}\r\n",
            REGISTRY_KEYS[1],
            vs12_path
        );
        // 11.0 points at a directory without devenv.exe
        let values_11 = format!(
            "\r\n{}\\11.0_Config\r\n    ShellFolder    REG_SZ    {}\r\n",
            REGISTRY_KEYS[1],
            vs12.path().join("missing").to_string_lossy()
        );

        let runner = ScriptedRunner::new()
            .on("reg", &["query", REGISTRY_KEYS[1]], &listing)
            .on("reg", &["query", &config_subkey("12.0"), "/v", "*"], &values_12)
            .on("reg", &["query", &config_subkey("11.0"), "/v", "*"], &values_11);

        let ctx = context(runner, no_vswhere());
        let result = detect(&ctx, false).await.unwrap();

        assert_eq!(result.installs.len(), 1);
        let install = result.selected().unwrap();
        assert_eq!(install.version, "12.0");
        assert_eq!(install.supported, Supported::Yes);
        let details = install.visual_studio().unwrap();
        assert_eq!(details.clr_version.as_deref(), Some("v4.0.30319"));
        assert!(details.registry_key.as_deref().unwrap().ends_with("12.0_Config"));
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_found_records_issue() {
        let ctx = context(ScriptedRunner::new(), no_vswhere());
        let result = detect(&ctx, false).await.unwrap();

        assert!(result.installs.is_empty());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].id, IssueId::WindowsVisualStudioNotInstalled);
    }

    #[tokio::test]
    async fn test_vswhere_instances() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("vswhere.exe");
        touch(&exe);
        let vs2017 = dir.path().join("2017").join("Community");
        let vs2019 = dir.path().join("2019").join("Preview");
        let instances = serde_json::json!([
            {
                "displayName": "Visual Studio Community 2017",
                "installationPath": vs2017,
                "installationVersion": "15.9.28307.1525",
                "isComplete": true,
                "productId": "Microsoft.VisualStudio.Product.Community"
            },
            {
                "displayName": "Visual Studio Preview 2019",
                "installationPath": vs2019,
                "installationVersion": "16.0.28315.86",
                "isComplete": false
            }
        ])
        .to_string();
        let exe_name = exe.to_string_lossy().into_owned();
        let runner = ScriptedRunner::new().respond(move |program, args| {
            if program != exe_name {
                return None;
            }
            if args.iter().any(|a| a == "-find") {
                return Some(Ok(CommandOutput::ok(r#"["C:\\MSBuild.exe"]"#)));
            }
            Some(Ok(CommandOutput::ok(instances.clone())))
        });

        let options = DetectOptions {
            vswhere_search_paths: vec![dir.path().to_string_lossy().into_owned()],
            ..Default::default()
        };
        let ctx = context(runner, options);
        let result = detect(&ctx, false).await.unwrap();

        assert_eq!(result.installs.len(), 1);
        let install = result.selected().unwrap();
        assert_eq!(install.version, "15.9.28307.1525");
        let details = install.visual_studio().unwrap();
        assert_eq!(details.msbuild, Some(PathBuf::from(r"C:\MSBuild.exe")));
        assert_eq!(
            details.vsdevcmd,
            Some(vs2017.join("Common7").join("Tools").join("VsDevCmd.bat"))
        );
    }

    #[tokio::test]
    async fn test_newer_than_range_is_maybe() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("vswhere.exe");
        touch(&exe);
        let instances = serde_json::json!([{
            "displayName": "Visual Studio 2030",
            "installationPath": dir.path().join("vs"),
            "installationVersion": "20.0.1",
            "isComplete": true
        }])
        .to_string();
        let runner = ScriptedRunner::new().respond(move |_, args| {
            (!args.iter().any(|a| a == "-find")).then(|| Ok(CommandOutput::ok(instances.clone())))
        });
        let options = DetectOptions {
            vswhere_search_paths: vec![exe.to_string_lossy().into_owned()],
            ..Default::default()
        };

        let result = detect(&context(runner, options), false).await.unwrap();
        let install = result.selected().unwrap();
        assert_eq!(install.supported, Supported::Maybe);
        assert_eq!(install.visual_studio().unwrap().msbuild, None);
    }
}
