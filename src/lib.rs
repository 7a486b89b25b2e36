//! # wintoolchain-discovery
//!
//! Toolchain discovery for Windows builds: Visual Studio, Windows SDKs,
//! Windows Phone SDKs, and the devices and emulators those SDKs can deploy
//! to.
//!
//! Every family is found the same way. Candidate installs are gathered from
//! the registry, the filesystem and `vswhere`, each candidate is validated
//! against the files it must contain, and one install per family is
//! selected from a preferred version or the highest supported one. Missing
//! tools are reported as [`Issue`]s rather than errors.
//!
//! ## Features
//!
//! - [`DetectionContext`] owning options, the subprocess runner and the
//!   result caches
//! - [`DetectionContext::detect`] producing a merged [`Report`]
//! - Per-family detection ([`DetectionContext::visual_studio`],
//!   [`DetectionContext::windows_sdks`],
//!   [`DetectionContext::windows_phone_sdks`])
//! - Device and emulator lifecycle (enumerate, connect, launch, install,
//!   stop)
//! - A [`CommandRunner`] seam so detection can run against scripted output
//!
//! ## Example
//!
//! ```rust,no_run
//! use wintoolchain_discovery::{DetectOptions, DetectionContext, ToolFamily};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), wintoolchain_discovery::DetectError> {
//!     let ctx = DetectionContext::new(DetectOptions::from_env());
//!
//!     // Detect a single family
//!     let sdks = ctx.windows_sdks(false).await?;
//!     if let Some(sdk) = sdks.selected() {
//!         println!("Windows SDK {} at {}", sdk.version, sdk.path.display());
//!     }
//!
//!     // Detect everything
//!     let report = ctx.detect(false).await?;
//!     for family in ToolFamily::all() {
//!         println!("{}: {} found", family.display_name(), report.installs(family).len());
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod context;
mod detect;
mod detection;
mod device;
mod environment;
mod error;
mod family;
mod issue;
mod merge;
mod options;
mod report;
mod runner;
mod tool_install;
mod visual_studio;
mod vswhere;
mod windows_phone;
mod windows_sdk;

pub use cache::ResultCache;
pub use context::{DetectionContext, DetectionContextBuilder, SUPPORTED_OS};
pub use device::{
    DeviceEnumeration, DeviceHandle, DeviceKind, DeviceState, LaunchOptions, ProcessInfo,
};
pub use environment::{MsBuildInfo, OsInfo, PowerShellInfo, MIN_MSBUILD_VERSION};
pub use error::{DetectError, Result};
pub use family::ToolFamily;
pub use issue::{Issue, IssueId, IssueType};
pub use merge::{merge_all, Merge};
pub use options::{DetectOptions, FamilyOptions, DEFAULT_VSWHERE_PATH, DEFAULT_WINDOWS_KITS_PATH};
pub use report::{Report, DETECT_VERSION};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use tool_install::{
    Architecture, DetectionResult, ExecutableMap, InstallDetails, Supported, ToolInstall,
    VisualStudioDetails, WindowsPhoneSdkDetails, WindowsSdkDetails,
};
pub use vswhere::{QueryOptions, VsInstance, VsWhere, MSBUILD_COMPONENT, MSBUILD_FIND_PATTERN};
pub use windows_phone::find_deploy_cmd;
pub use windows_sdk::{detect_sdks, SdkDefaults, WindowsSdk};
