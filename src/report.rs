//! The aggregate detection report.

use crate::device::{DeviceEnumeration, DeviceHandle};
use crate::environment::{MsBuildInfo, OsInfo, PowerShellInfo};
use crate::issue::{record_issue, Issue};
use crate::merge::Merge;
use crate::tool_install::{DetectionResult, ToolInstall};
use crate::ToolFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the report layout.
pub const DETECT_VERSION: &str = "3.0";

/// Everything detected on the host, keyed by version per family.
///
/// Built by merging partial reports: lists concatenate, version maps merge
/// with the later source winning, and optional sections are replaced by a
/// later source that has one. Issues are deduplicated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub detect_version: String,
    pub os: Option<OsInfo>,
    pub visual_studio: BTreeMap<String, ToolInstall>,
    pub windows_sdk: BTreeMap<String, ToolInstall>,
    pub windows_phone: BTreeMap<String, ToolInstall>,
    pub devices: Vec<DeviceHandle>,
    pub msbuild: Option<MsBuildInfo>,
    pub powershell: Option<PowerShellInfo>,
    pub issues: Vec<Issue>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            detect_version: DETECT_VERSION.to_string(),
            os: None,
            visual_studio: BTreeMap::new(),
            windows_sdk: BTreeMap::new(),
            windows_phone: BTreeMap::new(),
            devices: Vec::new(),
            msbuild: None,
            powershell: None,
            issues: Vec::new(),
        }
    }
}

impl Merge for Report {
    fn merge(&mut self, other: Self) {
        self.detect_version = other.detect_version;
        self.os.merge(other.os);
        self.visual_studio.merge(other.visual_studio);
        self.windows_sdk.merge(other.windows_sdk);
        self.windows_phone.merge(other.windows_phone);
        self.devices.merge(other.devices);
        self.msbuild.merge(other.msbuild);
        self.powershell.merge(other.powershell);
        for issue in other.issues {
            record_issue(&mut self.issues, issue);
        }
    }
}

impl Report {
    /// A partial report holding one family's installs and issues.
    pub fn from_family(result: &DetectionResult) -> Self {
        let mut report = Self {
            issues: result.issues.clone(),
            ..Default::default()
        };
        let installs = result.by_version();
        match result.family {
            ToolFamily::VisualStudio => report.visual_studio = installs,
            ToolFamily::WindowsSdk => report.windows_sdk = installs,
            ToolFamily::WindowsPhoneSdk => report.windows_phone = installs,
        }
        report
    }

    /// A partial report holding enumerated devices and their issues.
    pub fn from_devices(enumeration: &DeviceEnumeration) -> Self {
        Self {
            devices: enumeration.devices.clone(),
            issues: enumeration.issues.clone(),
            ..Default::default()
        }
    }

    /// Installs of `family`, keyed by version.
    pub fn installs(&self, family: ToolFamily) -> &BTreeMap<String, ToolInstall> {
        match family {
            ToolFamily::VisualStudio => &self.visual_studio,
            ToolFamily::WindowsSdk => &self.windows_sdk,
            ToolFamily::WindowsPhoneSdk => &self.windows_phone,
        }
    }

    /// The install selected for `family`, if any.
    pub fn selected(&self, family: ToolFamily) -> Option<&ToolInstall> {
        self.installs(family).values().find(|install| install.selected)
    }

    pub fn selected_visual_studio(&self) -> Option<&ToolInstall> {
        self.selected(ToolFamily::VisualStudio)
    }

    pub fn selected_windows_sdk(&self) -> Option<&ToolInstall> {
        self.selected(ToolFamily::WindowsSdk)
    }

    pub fn selected_windows_phone_sdk(&self) -> Option<&ToolInstall> {
        self.selected(ToolFamily::WindowsPhoneSdk)
    }
}
