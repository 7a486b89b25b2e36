//! Tool family enum identifying the kinds of tooling that can be detected.

use crate::issue::IssueId;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// A category of detectable Windows build tooling.
///
/// Each family has its own scanner, validator and selection policy. The
/// enum is `#[non_exhaustive]` so new families can be added without a
/// breaking change.
///
/// # Example
///
/// ```rust
/// use wintoolchain_discovery::ToolFamily;
///
/// for family in ToolFamily::all() {
///     println!("{} (cache key {})", family.display_name(), family.cache_key());
/// }
/// ```
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
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum ToolFamily {
    /// Microsoft Visual Studio (registry-registered and vswhere-registered).
    VisualStudio,
    /// Windows 10+ SDK ("Windows Kits").
    WindowsSdk,
    /// Windows Phone SDK.
    WindowsPhoneSdk,
}

impl ToolFamily {
    /// Human-readable name for messages.
    ///
    /// ```rust
    /// use wintoolchain_discovery::ToolFamily;
    ///
    /// assert_eq!(ToolFamily::WindowsSdk.display_name(), "Windows SDK");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::VisualStudio => "Microsoft Visual Studio",
            Self::WindowsSdk => "Windows SDK",
            Self::WindowsPhoneSdk => "Microsoft Windows Phone SDK",
        }
    }

    /// Key under which the family's detection result is cached.
    pub fn cache_key(&self) -> &'static str {
        match self {
            Self::VisualStudio => "visualstudio",
            Self::WindowsSdk => "sdk",
            Self::WindowsPhoneSdk => "windowsphone",
        }
    }

    /// The issue recorded when no install of this family validates.
    pub fn not_installed_issue(&self) -> IssueId {
        match self {
            Self::VisualStudio => IssueId::WindowsVisualStudioNotInstalled,
            Self::WindowsSdk => IssueId::WindowsSdkNotInstalled,
            Self::WindowsPhoneSdk => IssueId::WindowsPhoneSdkNotInstalled,
        }
    }

    /// Iterator over all known families.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_all_iterator() {
        let all: Vec<_> = ToolFamily::all().collect();
        assert_eq!(
            all,
            vec![
                ToolFamily::VisualStudio,
                ToolFamily::WindowsSdk,
                ToolFamily::WindowsPhoneSdk
            ]
        );
    }

    #[test]
    fn test_cache_keys_are_distinct() {
        let keys: std::collections::HashSet<_> = ToolFamily::all().map(|f| f.cache_key()).collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_round_trip_through_str() {
        assert_eq!(ToolFamily::WindowsPhoneSdk.to_string(), "windows-phone-sdk");
        assert_eq!(
            ToolFamily::from_str("visual-studio").unwrap(),
            ToolFamily::VisualStudio
        );

        let json = serde_json::to_string(&ToolFamily::WindowsSdk).unwrap();
        assert_eq!(json, "\"windows-sdk\"");
    }

    #[test]
    fn test_not_installed_issue_ids() {
        assert_eq!(
            ToolFamily::VisualStudio.not_installed_issue().as_ref(),
            "WINDOWS_VISUAL_STUDIO_NOT_INSTALLED"
        );
        assert_eq!(
            ToolFamily::WindowsPhoneSdk.not_installed_issue().as_ref(),
            "WINDOWS_PHONE_SDK_NOT_INSTALLED"
        );
    }
}
