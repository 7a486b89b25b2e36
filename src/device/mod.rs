//! Windows Phone devices and emulators.
//!
//! Targets are discovered through each SDK's deploy tool
//! (`/EnumerateDevices`) and represented by a [`DeviceHandle`]. Handles are
//! plain values: lifecycle operations on
//! [`DetectionContext`](crate::DetectionContext) take `&mut DeviceHandle` and
//! update its [`DeviceState`] when they succeed.
//!
//! ```text
//! Enumerated ──connect──▶ Connecting ──ok──▶ Connected
//!      ▲                      │  └─timeout─▶ TimedOut
//!      └────────error─────────┘
//! Connected/Running ──install──▶ Running ──stop──▶ Stopped
//! ```

mod lifecycle;
mod process;

pub use process::ProcessInfo;

use crate::issue::Issue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

fn target_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ ([0-9]*)\t\t(.*)$").expect("Invalid target regex"))
}

/// Physical phone or emulator image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    Device,
    Emulator,
}

impl DeviceKind {
    /// Deploy tools list physical phones with "Device" in their name.
    pub fn from_name(name: &str) -> Self {
        if name.to_ascii_lowercase().contains("device") {
            Self::Device
        } else {
            Self::Emulator
        }
    }
}

/// Where a handle is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceState {
    /// Listed by the deploy tool, not yet confirmed reachable.
    Enumerated,
    Connecting,
    Connected,
    /// An app was installed or launched on the target.
    Running,
    Stopped,
    /// The last connect or install did not finish in time.
    TimedOut,
}

impl DeviceState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connected | Self::Running)
    }
}

/// A connectable device or emulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// `<sdk version>:<index>`, unique within one process run.
    pub udid: String,
    /// Position in the deploy tool's listing, passed as `/targetdevice:`.
    pub index: u32,
    pub name: String,
    pub kind: DeviceKind,
    /// Windows Phone SDK that listed the target.
    pub sdk_version: String,
    pub deploy_cmd: PathBuf,
    pub state: DeviceState,
    /// Set when the handle is launched.
    #[serde(skip)]
    pub started_at: Option<tokio::time::Instant>,
}

impl DeviceHandle {
    /// A freshly enumerated target. Its kind is taken from `name`.
    pub fn new(sdk_version: &str, deploy_cmd: PathBuf, index: u32, name: &str) -> Self {
        Self {
            udid: format!("{sdk_version}:{index}"),
            index,
            name: name.to_string(),
            kind: DeviceKind::from_name(name),
            sdk_version: sdk_version.to_string(),
            deploy_cmd,
            state: DeviceState::Enumerated,
            started_at: None,
        }
    }

    pub fn is_emulator(&self) -> bool {
        self.kind == DeviceKind::Emulator
    }

    /// `true` once connect, launch or install has succeeded and the handle
    /// has not been stopped since.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// Targets found across all Windows Phone SDKs, with the issues raised
/// while listing them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEnumeration {
    pub devices: Vec<DeviceHandle>,
    pub issues: Vec<Issue>,
}

impl DeviceEnumeration {
    pub fn emulators(&self) -> impl Iterator<Item = &DeviceHandle> {
        self.devices.iter().filter(|d| d.is_emulator())
    }

    /// Looks a target up by its `<sdk version>:<index>` UDID.
    pub fn by_udid(&self, udid: &str) -> Option<&DeviceHandle> {
        self.devices.iter().find(|d| d.udid == udid)
    }
}

/// Options for launching or installing to a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Only consider targets listed by this Windows Phone SDK.
    pub sdk_version: Option<String>,
    /// App package to install. Without it, launch only connects.
    pub app_path: Option<PathBuf>,
    /// Install without launching the app.
    pub skip_launch: bool,
    /// Stop a running instance of the emulator first.
    pub kill_if_running: bool,
    /// Defaults to the context's subprocess timeout.
    pub timeout: Option<Duration>,
}

impl LaunchOptions {
    /// Sets the timeout, never less than one millisecond.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.max(Duration::from_millis(1)));
        self
    }
}

/// Parses `/EnumerateDevices` output into `(index, name)` pairs.
pub(crate) fn parse_targets(output: &str) -> Vec<(u32, String)> {
    output
        .lines()
        .filter_map(|line| {
            let caps = target_line().captures(line)?;
            let index = caps[1].parse().ok()?;
            Some((index, caps[2].trim_end().to_string()))
        })
        .collect()
}
