//! Install records produced by detection.

use crate::issue::Issue;
use crate::ToolFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Whether a discovered version is known to work.
///
/// `Maybe` covers versions newer than the supported range: they are usable
/// on a best-effort basis and remain eligible for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supported {
    Yes,
    No,
    Maybe,
}

impl Supported {
    /// `true` for `Yes` and `Maybe`.
    pub fn is_compatible(&self) -> bool {
        !matches!(self, Self::No)
    }
}

/// Target architectures probed for SDK executables.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Architecture {
    Arm,
    Arm64,
    X86,
    X64,
}

/// Availability of a helper executable, per architecture. `None` means the
/// file is absent for that architecture.
pub type ExecutableMap = BTreeMap<String, BTreeMap<Architecture, Option<PathBuf>>>;

/// Visual Studio specific data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualStudioDetails {
    /// Display name reported by vswhere.
    pub name: Option<String>,
    pub product_id: Option<String>,
    /// `false` only for vswhere instances that are partially installed.
    pub complete: bool,
    /// Registry key the install was found under (legacy installs).
    pub registry_key: Option<String>,
    pub clr_version: Option<String>,
    /// Build environment script (`VC\vcvarsall.bat`).
    pub vcvarsall: Option<PathBuf>,
    /// Developer command prompt script (`Common7\Tools\VsDevCmd.bat`).
    pub vsdevcmd: Option<PathBuf>,
    pub msbuild: Option<PathBuf>,
    /// Windows Phone sub-SDKs keyed by version, pointing at their
    /// `vcvarsphoneall.bat`.
    pub wpsdk: BTreeMap<String, PathBuf>,
}

/// Windows SDK specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsSdkDetails {
    pub name: Option<String>,
    /// Integer prefix of the version string.
    pub major_version: u32,
    pub min_vs_version: Option<String>,
    pub bin_dir: PathBuf,
    pub include_dir: PathBuf,
    pub platforms_dir: PathBuf,
    pub executables: ExecutableMap,
}

/// Windows Phone SDK specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsPhoneSdkDetails {
    pub registry_key: String,
    /// `XapDeployCmd.exe` (8.0) or `AppDeployCmd.exe` (8.1).
    pub deploy_cmd: Option<PathBuf>,
}

/// Family-specific extension of a [`ToolInstall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallDetails {
    VisualStudio(VisualStudioDetails),
    WindowsSdk(WindowsSdkDetails),
    WindowsPhoneSdk(WindowsPhoneSdkDetails),
}

/// One discovered installation of a tool family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInstall {
    pub family: ToolFamily,
    pub version: String,
    pub path: PathBuf,
    pub supported: Supported,
    /// At most one install per family is selected.
    pub selected: bool,
    pub details: InstallDetails,
}

impl ToolInstall {
    /// Visual Studio details, `None` for other families.
    pub fn visual_studio(&self) -> Option<&VisualStudioDetails> {
        match &self.details {
            InstallDetails::VisualStudio(details) => Some(details),
            _ => None,
        }
    }

    pub fn windows_sdk(&self) -> Option<&WindowsSdkDetails> {
        match &self.details {
            InstallDetails::WindowsSdk(details) => Some(details),
            _ => None,
        }
    }

    pub fn windows_phone_sdk(&self) -> Option<&WindowsPhoneSdkDetails> {
        match &self.details {
            InstallDetails::WindowsPhoneSdk(details) => Some(details),
            _ => None,
        }
    }

    /// Path to the install root.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The outcome of detecting one family.
///
/// Installs are kept in scan order and are unique by version string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub family: ToolFamily,
    pub installs: Vec<ToolInstall>,
    pub issues: Vec<Issue>,
}

impl DetectionResult {
    /// An empty result for `family`.
    pub fn new(family: ToolFamily) -> Self {
        Self {
            family,
            installs: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// The selected install, if any candidate was compatible.
    pub fn selected(&self) -> Option<&ToolInstall> {
        self.installs.iter().find(|install| install.selected)
    }

    /// Looks up an install by its exact version string.
    pub fn get(&self, version: &str) -> Option<&ToolInstall> {
        self.installs.iter().find(|install| install.version == version)
    }

    /// Installs keyed by version.
    pub fn by_version(&self) -> BTreeMap<String, ToolInstall> {
        self.installs
            .iter()
            .map(|install| (install.version.clone(), install.clone()))
            .collect()
    }

    /// Adds an install unless one with the same version was already found.
    pub(crate) fn push_install(&mut self, install: ToolInstall) -> bool {
        if self.get(&install.version).is_some() {
            return false;
        }
        self.installs.push(install);
        true
    }
}
