//! Windows 10 SDK detection.
//!
//! SDK roots come from two places: version-named directories under the
//! Windows Kits folder, and the `InstallationFolder` registry values. Each
//! root holds an `SDKManifest.xml` and one `Include\<revision>` directory
//! per installed revision. A revision is only reported when its header,
//! platform directory and `Platform.xml` all agree.

use crate::context::DetectionContext;
use crate::detection::manifest::{parse_platform, parse_sdk_manifest};
use crate::detection::path_finder::{expand_path, is_exe_file};
use crate::detection::{registry, selector, version};
use crate::issue::{record_issue, Issue};
use crate::tool_install::{
    Architecture, DetectionResult, ExecutableMap, InstallDetails, Supported, ToolInstall,
    WindowsSdkDetails,
};
use crate::{DetectError, Result, ToolFamily};
use futures::future::try_join_all;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use strum::IntoEnumIterator;

/// Registry keys whose subkeys carry an `InstallationFolder` value.
pub const REGISTRY_KEYS: [&str; 2] = [
    r"HKLM\Software\Microsoft\Microsoft SDKs\Windows",
    r"HKLM\Software\Wow6432Node\Microsoft\Microsoft SDKs\Windows",
];

/// Helper executables probed in `bin\<revision>\<arch>`.
pub const EXECUTABLES: [&str; 3] = ["makecert", "pvk2pfx", "WinAppDeployCmd"];

fn kit_dir_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v?\d+").expect("Invalid kit directory regex"))
}

/// Name and minimum Visual Studio version declared by `SDKManifest.xml`,
/// used when a revision's `Platform.xml` does not provide them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkDefaults {
    pub name: Option<String>,
    pub min_vs_version: Option<String>,
}

/// One validated SDK revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsSdk {
    pub version: String,
    /// The SDK root (the directory holding `SDKManifest.xml`).
    pub root: PathBuf,
    pub details: WindowsSdkDetails,
}

impl WindowsSdk {
    /// Validates revision `version` of the SDK rooted at `dir`.
    ///
    /// Fails with [`DetectError::InvalidInstall`] when `Windows.h`, the
    /// platform directory or `Platform.xml` is missing, when `Platform.xml`
    /// cannot be parsed, or when its version differs from `version`.
    pub fn from_dir(dir: &Path, version: &str, defaults: &SdkDefaults) -> Result<Self> {
        if dir.as_os_str().is_empty() {
            return Err(DetectError::invalid_argument(
                "Expected SDK directory to be a non-empty path",
            ));
        }
        if version.is_empty() {
            return Err(DetectError::invalid_argument(
                "Expected version to be a non-empty string",
            ));
        }

        let bin_dir = dir.join("bin").join(version);
        let include_dir = dir.join("Include").join(version);
        let platforms_dir = dir.join("Platforms").join("UAP").join(version);

        if !include_dir.join("um").join("Windows.h").is_file() {
            return Err(DetectError::invalid_install(format!(
                "Unable to find \"Windows.h\" for SDK revision \"{version}\""
            )));
        }
        if !platforms_dir.is_dir() {
            return Err(DetectError::invalid_install(format!(
                "Unable to find the platform directory for SDK revision \"{version}\""
            )));
        }
        let platform_xml = platforms_dir.join("Platform.xml");
        if !platform_xml.is_file() {
            return Err(DetectError::invalid_install(format!(
                "Unable to find the \"Platform.xml\" file for SDK revision \"{version}\""
            )));
        }

        let invalid_platform = || {
            DetectError::invalid_install(format!(
                "Invalid \"Platform.xml\" file for SDK revision \"{version}\""
            ))
        };
        let xml = std::fs::read_to_string(&platform_xml).map_err(|_| invalid_platform())?;
        let platform = parse_platform(&xml, &platform_xml).map_err(|e| {
            tracing::debug!(error = %e, "Platform.xml parse failure");
            invalid_platform()
        })?;

        let declared = platform.version.unwrap_or_default();
        if declared != version {
            return Err(DetectError::invalid_install(format!(
                "Version \"{declared}\" in \"Platform.xml\" does not match \
                 specified version \"{version}\""
            )));
        }

        let executables = probe_executables(&bin_dir);

        Ok(Self {
            version: version.to_string(),
            root: dir.to_path_buf(),
            details: WindowsSdkDetails {
                name: platform.friendly_name.or_else(|| defaults.name.clone()),
                major_version: version::major_version(version).unwrap_or(0),
                min_vs_version: platform
                    .min_vs_version
                    .or_else(|| defaults.min_vs_version.clone()),
                bin_dir,
                include_dir,
                platforms_dir,
                executables,
            },
        })
    }

    /// Converts into the family-neutral install record.
    pub fn into_install(self, supported: Supported) -> ToolInstall {
        ToolInstall {
            family: ToolFamily::WindowsSdk,
            version: self.version,
            path: self.root,
            supported,
            selected: false,
            details: InstallDetails::WindowsSdk(self.details),
        }
    }
}

/// Every known executable for every architecture, `None` where absent.
fn probe_executables(bin_dir: &Path) -> ExecutableMap {
    EXECUTABLES
        .iter()
        .map(|exe| {
            let per_arch: BTreeMap<Architecture, Option<PathBuf>> = Architecture::iter()
                .map(|arch| {
                    let file = bin_dir.join(arch.as_ref()).join(format!("{exe}.exe"));
                    (arch, is_exe_file(&file).then_some(file))
                })
                .collect();
            (exe.to_string(), per_arch)
        })
        .collect()
}

/// Scans one SDK root for all of its valid revisions.
///
/// The root must contain `SDKManifest.xml` and an `Include` directory.
/// Revisions that fail validation are skipped.
pub fn detect_sdks(dir: &Path) -> Result<Vec<WindowsSdk>> {
    let manifest_file = dir.join("SDKManifest.xml");
    if !manifest_file.is_file() {
        return Err(DetectError::invalid_install(
            "Directory does not contain an \"SDKManifest.xml\" file",
        ));
    }
    let unreadable = || {
        DetectError::invalid_install(format!(
            "Unable to read Windows SDK manifest: {}",
            manifest_file.display()
        ))
    };
    let xml = std::fs::read_to_string(&manifest_file).map_err(|_| unreadable())?;
    let manifest = parse_sdk_manifest(&xml, &manifest_file).map_err(|_| unreadable())?;

    let include_dir = dir.join("Include");
    if !include_dir.is_dir() {
        return Err(DetectError::invalid_install(
            "Directory does not contain an \"Include\" directory",
        ));
    }

    let defaults = SdkDefaults {
        name: manifest.display_name,
        min_vs_version: manifest.min_vs_version,
    };

    let mut revisions: Vec<String> = std::fs::read_dir(&include_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    revisions.sort_by(|a, b| version::compare_versions(a, b));

    Ok(revisions
        .iter()
        .filter_map(|revision| match WindowsSdk::from_dir(dir, revision, &defaults) {
            Ok(sdk) => Some(sdk),
            Err(e) => {
                tracing::debug!(
                    dir = %dir.display(),
                    revision,
                    error = %e,
                    "skipping SDK revision"
                );
                None
            }
        })
        .collect())
}

/// Version-named subdirectories of each search path, in order.
fn scan_kits_dirs(search_paths: &[String]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for entry in search_paths {
        let root = expand_path(entry);
        let Ok(listing) = std::fs::read_dir(&root) else {
            tracing::debug!(root = %root.display(), "Windows Kits directory not readable");
            continue;
        };
        let mut names: Vec<String> = listing
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| kit_dir_name().is_match(name))
            .collect();
        names.sort_by(|a, b| version::compare_versions(a, b));
        dirs.extend(names.into_iter().map(|name| root.join(name)));
    }
    dirs
}

/// `InstallationFolder` of every SDK registered in the registry.
async fn scan_registry(ctx: &DetectionContext) -> Result<Vec<PathBuf>> {
    let listings = try_join_all(
        REGISTRY_KEYS
            .iter()
            .map(|key| registry::list_subkeys(ctx.runner(), key, ctx.timeout())),
    )
    .await?;

    let folders = try_join_all(listings.into_iter().flatten().map(|subkey| async move {
        registry::get_value(ctx.runner(), &subkey, "InstallationFolder", ctx.timeout()).await
    }))
    .await?;

    Ok(folders
        .into_iter()
        .flatten()
        .filter(|folder| !folder.is_empty())
        .map(|folder| expand_path(&folder))
        .collect())
}

pub(crate) async fn detect(ctx: &DetectionContext) -> Result<DetectionResult> {
    let mut roots = scan_kits_dirs(&ctx.options().windows_sdk_search_paths);
    for dir in scan_registry(ctx).await? {
        if !roots.contains(&dir) {
            roots.push(dir);
        }
    }
    tracing::debug!(count = roots.len(), "Windows SDK roots");

    let range = ctx.options().windows_sdk.supported_range.as_deref();
    let mut result = DetectionResult::new(ToolFamily::WindowsSdk);
    for root in &roots {
        let sdks = match detect_sdks(root) {
            Ok(sdks) => sdks,
            Err(e) => {
                tracing::debug!(root = %root.display(), error = %e, "not an SDK root");
                continue;
            }
        };
        for sdk in sdks {
            let supported = version::satisfies(&sdk.version, range, false);
            result.push_install(sdk.into_install(supported));
        }
    }

    if result.installs.is_empty() {
        record_issue(
            &mut result.issues,
            Issue::error(ToolFamily::WindowsSdk.not_installed_issue()),
        );
    }

    let preferred = ctx.options().windows_sdk.preferred_version.as_deref();
    selector::select(&mut result.installs, preferred);

    tracing::info!(
        found = result.installs.len(),
        selected = ?result.selected().map(|i| i.version.as_str()),
        "Windows SDK detection finished"
    );
    Ok(result)
}
