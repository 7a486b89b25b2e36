//! Diagnostics recorded instead of failing detection.

use serde::{Deserialize, Serialize};

/// Stable, machine-readable identifier of an [`Issue`].
///
/// The string form (`WINDOWS_SDK_NOT_INSTALLED`, ...) is what tooling
/// should branch on; it never changes between releases.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::AsRefStr,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum IssueId {
    WindowsVisualStudioNotInstalled,
    WindowsSdkNotInstalled,
    WindowsPhoneSdkNotInstalled,
    WindowsPhoneSdkMissingDeployCmd,
    WindowsPhoneEnumerateDevicesFailed,
    WindowsPhoneEmulatorNotInstalled,
    WindowsPhonePowershellScriptsDisabled,
    WindowsMsbuildError,
    WindowsMsbuildTooOld,
}

impl IssueId {
    /// Default human-readable remediation text.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::WindowsVisualStudioNotInstalled => {
                "Microsoft Visual Studio not found.\n\
                 You will be unable to build Windows Phone or Windows Store apps.\n\
                 Install Visual Studio with the Universal Windows Platform workload."
            }
            Self::WindowsSdkNotInstalled => {
                "Windows SDK not found.\n\
                 You will be unable to build Windows Store apps.\n\
                 Install a Windows 10 SDK from the Visual Studio installer."
            }
            Self::WindowsPhoneSdkNotInstalled => {
                "Microsoft Windows Phone SDK not found.\n\
                 You will be unable to build Windows Phone apps."
            }
            Self::WindowsPhoneSdkMissingDeployCmd => {
                "Microsoft Windows Phone SDK is missing the deploy command.\n\
                 You will be unable to build Windows Phone apps."
            }
            Self::WindowsPhoneEnumerateDevicesFailed => {
                "Failed to enumerate Windows Phone devices.\n\
                 Ensure that the Windows Phone SDK is properly installed."
            }
            Self::WindowsPhoneEmulatorNotInstalled => {
                "Windows Phone Emulator is not installed.\n\
                 Ensure that the Windows Phone Emulator is properly installed.\n\
                 You must be running 64-bit Windows 8.1 Pro with Hyper-V support enabled."
            }
            Self::WindowsPhonePowershellScriptsDisabled => {
                "Executing PowerShell scripts is disabled.\n\
                 To enable PowerShell scripts, run PowerShell as administrator, then run:\n    \
                 Set-ExecutionPolicy -ExecutionPolicy RemoteSigned -Scope CurrentUser"
            }
            Self::WindowsMsbuildError => {
                "Failed to run MSBuild.\n\
                 This is most likely due to Visual Studio being unable to find a \
                 suitable .NET framework.\n\
                 Please install the latest .NET framework."
            }
            Self::WindowsMsbuildTooOld => {
                "The installed MSBuild version is too old.\n\
                 Please install the latest .NET framework."
            }
        }
    }
}

/// Severity of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Info,
    Warning,
    Error,
}

/// A non-fatal diagnostic describing a missing or degraded capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    #[serde(rename = "type")]
    pub kind: IssueType,
    pub message: String,
}

impl Issue {
    /// An error-severity issue carrying the id's default message.
    pub fn error(id: IssueId) -> Self {
        Self {
            id,
            kind: IssueType::Error,
            message: id.default_message().to_string(),
        }
    }

    /// Replaces the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Appends `issue` unless an issue with the same id is already present.
///
/// Returns `true` when the issue was recorded.
pub(crate) fn record_issue(issues: &mut Vec<Issue>, issue: Issue) -> bool {
    if issues.iter().any(|existing| existing.id == issue.id) {
        return false;
    }
    issues.push(issue);
    true
}
