//! Detection options configuration.
//!
//! This module provides [`DetectOptions`], which carries every configurable
//! input of detection: per-family version preferences, search paths, the
//! PowerShell executable and the subprocess timeout. Options can be built in
//! code, deserialized from a caller's config file, or overlaid from the
//! process environment with [`DetectOptions::from_env`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of `vswhere.exe`.
pub const DEFAULT_VSWHERE_PATH: &str =
    r"%ProgramFiles(x86)%\Microsoft Visual Studio\Installer\vswhere.exe";

/// Default root under which Windows SDKs are installed.
pub const DEFAULT_WINDOWS_KITS_PATH: &str = r"%ProgramFiles(x86)%\Windows Kits";

/// Version preferences for one tool family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyOptions {
    /// Version to select when it is present and compatible.
    pub preferred_version: Option<String>,

    /// Supported version range in semver requirement syntax (e.g.
    /// `">=10, <=17"`). `None` means every version is supported.
    pub supported_range: Option<String>,
}

impl FamilyOptions {
    fn with_range(range: &str) -> Self {
        Self {
            preferred_version: None,
            supported_range: Some(range.to_string()),
        }
    }
}

/// Configuration options for detection.
///
/// # Example
///
/// ```rust
/// use wintoolchain_discovery::DetectOptions;
/// use std::time::Duration;
///
/// // Re-detect everything and prefer Visual Studio 15.x
/// let mut opts = DetectOptions {
///     bypass_cache: true,
///     timeout: Duration::from_secs(10),
///     ..Default::default()
/// };
/// opts.visual_studio.preferred_version = Some("15.9.28307.1525".to_string());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    /// Ignore cached results and re-detect.
    ///
    /// Default: `false`
    pub bypass_cache: bool,

    /// Timeout applied to each external tool invocation.
    ///
    /// Default: 5 seconds
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Visual Studio preferences. Versions above the range are "maybe"
    /// supported.
    ///
    /// Default range: `>=10, <=17`
    pub visual_studio: FamilyOptions,

    /// Windows SDK preferences.
    ///
    /// Default range: `>=10`
    pub windows_sdk: FamilyOptions,

    /// Windows Phone SDK preferences. Versions outside the range are
    /// unsupported.
    ///
    /// Default range: `>=8.0, <9.0`
    pub windows_phone: FamilyOptions,

    /// Files or directories searched for `vswhere.exe`. May contain
    /// `%VAR%` references.
    pub vswhere_search_paths: Vec<String>,

    /// Roots scanned for Windows SDK directories. May contain `%VAR%`
    /// references.
    pub windows_sdk_search_paths: Vec<String>,

    /// The PowerShell executable.
    ///
    /// Default: `powershell`
    pub powershell: PathBuf,

    /// Report Visual Studio instances that vswhere flags as incomplete.
    ///
    /// Default: `false`
    pub include_incomplete: bool,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            bypass_cache: false,
            timeout: Duration::from_secs(5),
            visual_studio: FamilyOptions::with_range(">=10, <=17"),
            windows_sdk: FamilyOptions::with_range(">=10"),
            windows_phone: FamilyOptions::with_range(">=8.0, <9.0"),
            vswhere_search_paths: vec![DEFAULT_VSWHERE_PATH.to_string()],
            windows_sdk_search_paths: vec![DEFAULT_WINDOWS_KITS_PATH.to_string()],
            powershell: PathBuf::from("powershell"),
            include_incomplete: false,
        }
    }
}

impl DetectOptions {
    /// Default options overlaid with `WINTOOLCHAIN_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `WINTOOLCHAIN_VS_VERSION` | `visual_studio.preferred_version` |
    /// | `WINTOOLCHAIN_SDK_VERSION` | `windows_sdk.preferred_version` |
    /// | `WINTOOLCHAIN_WPSDK_VERSION` | `windows_phone.preferred_version` |
    /// | `WINTOOLCHAIN_VSWHERE_PATHS` | `vswhere_search_paths` (`;`-separated) |
    /// | `WINTOOLCHAIN_POWERSHELL` | `powershell` |
    /// | `WINTOOLCHAIN_TIMEOUT_MS` | `timeout` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(version) = non_empty("WINTOOLCHAIN_VS_VERSION") {
            opts.visual_studio.preferred_version = Some(version);
        }
        if let Some(version) = non_empty("WINTOOLCHAIN_SDK_VERSION") {
            opts.windows_sdk.preferred_version = Some(version);
        }
        if let Some(version) = non_empty("WINTOOLCHAIN_WPSDK_VERSION") {
            opts.windows_phone.preferred_version = Some(version);
        }
        if let Some(paths) = non_empty("WINTOOLCHAIN_VSWHERE_PATHS") {
            opts.vswhere_search_paths = paths
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(powershell) = non_empty("WINTOOLCHAIN_POWERSHELL") {
            opts.powershell = PathBuf::from(powershell);
        }
        match non_empty("WINTOOLCHAIN_TIMEOUT_MS").map(|ms| ms.trim().parse::<u64>()) {
            Some(Ok(ms)) => opts.timeout = Duration::from_millis(ms.max(1)),
            Some(Err(_)) => tracing::warn!("ignoring malformed WINTOOLCHAIN_TIMEOUT_MS"),
            None => {}
        }

        opts
    }
}

mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_timeout() {
        let opts = DetectOptions::default();
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert!(!opts.bypass_cache);
    }

    #[test]
    fn test_default_ranges() {
        let opts = DetectOptions::default();
        assert_eq!(opts.visual_studio.supported_range.as_deref(), Some(">=10, <=17"));
        assert_eq!(opts.windows_phone.supported_range.as_deref(), Some(">=8.0, <9.0"));
        assert!(opts.visual_studio.preferred_version.is_none());
    }

    #[test]
    fn test_from_lookup_overlays_values() {
        let env: HashMap<&str, &str> = [
            ("WINTOOLCHAIN_VS_VERSION", "12.0"),
            ("WINTOOLCHAIN_WPSDK_VERSION", "8.1"),
            ("WINTOOLCHAIN_VSWHERE_PATHS", r"C:\a\vswhere.exe; C:\b ;"),
            ("WINTOOLCHAIN_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();

        let opts = DetectOptions::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(opts.visual_studio.preferred_version.as_deref(), Some("12.0"));
        assert_eq!(opts.windows_phone.preferred_version.as_deref(), Some("8.1"));
        assert!(opts.windows_sdk.preferred_version.is_none());
        assert_eq!(
            opts.vswhere_search_paths,
            vec![r"C:\a\vswhere.exe".to_string(), r"C:\b".to_string()]
        );
        assert_eq!(opts.timeout, Duration::from_millis(250));
        assert_eq!(opts.powershell, PathBuf::from("powershell"));
    }

    #[test]
    fn test_from_lookup_ignores_malformed_timeout() {
        let opts = DetectOptions::from_lookup(|key| {
            (key == "WINTOOLCHAIN_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(opts.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let json = r#"{
            "timeout_ms": 1500,
            "windows_sdk": { "preferred_version": "10.0.17763.0" }
        }"#;
        let opts: DetectOptions = serde_json::from_str(json).unwrap();

        assert_eq!(opts.timeout, Duration::from_millis(1500));
        assert_eq!(
            opts.windows_sdk.preferred_version.as_deref(),
            Some("10.0.17763.0")
        );
        // Field-level default replaces the whole family entry.
        assert!(opts.windows_sdk.supported_range.is_none());
        assert_eq!(opts.vswhere_search_paths, vec![DEFAULT_VSWHERE_PATH.to_string()]);
    }
}
