//! The detection context: options, subprocess runner and result caches.

use crate::cache::ResultCache;
use crate::device::DeviceEnumeration;
use crate::report::Report;
use crate::runner::{CommandRunner, SystemRunner};
use crate::tool_install::DetectionResult;
use crate::vswhere::VsWhere;
use crate::{visual_studio, windows_phone, windows_sdk};
use crate::{DetectError, DetectOptions, Result, ToolFamily};
use std::sync::Arc;
use std::time::Duration;

/// The only operating system detection runs on.
pub const SUPPORTED_OS: &str = "windows";

const VSWHERE_CACHE_KEY: &str = "vswhere";

/// Owns everything a detection pass needs.
///
/// Results are cached per family for the lifetime of the context. Pass
/// `force = true` (or set [`DetectOptions::bypass_cache`]) to re-detect.
///
/// # Example
///
/// ```rust,no_run
/// use wintoolchain_discovery::{DetectOptions, DetectionContext};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), wintoolchain_discovery::DetectError> {
///     let ctx = DetectionContext::new(DetectOptions::from_env());
///     let report = ctx.detect(false).await?;
///     if let Some(vs) = report.selected_visual_studio() {
///         println!("using Visual Studio {} at {}", vs.version, vs.path.display());
///     }
///     for issue in &report.issues {
///         eprintln!("{}: {}", issue.id, issue.message);
///     }
///     Ok(())
/// }
/// ```
pub struct DetectionContext {
    runner: Arc<dyn CommandRunner>,
    options: DetectOptions,
    target_os: String,
    pub(crate) families: ResultCache<Arc<DetectionResult>>,
    pub(crate) vswhere: ResultCache<Option<VsWhere>>,
    pub(crate) reports: ResultCache<Arc<Report>>,
    pub(crate) devices: ResultCache<Arc<DeviceEnumeration>>,
}

impl std::fmt::Debug for DetectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionContext")
            .field("options", &self.options)
            .field("target_os", &self.target_os)
            .finish_non_exhaustive()
    }
}

impl DetectionContext {
    /// A context running real processes on the current host.
    pub fn new(options: DetectOptions) -> Self {
        Self::builder().options(options).build()
    }

    /// Starts a [`DetectionContextBuilder`] for a custom runner or target
    /// OS.
    pub fn builder() -> DetectionContextBuilder {
        DetectionContextBuilder::default()
    }

    /// The options detection runs with.
    pub fn options(&self) -> &DetectOptions {
        &self.options
    }

    /// The runner every external tool goes through.
    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// The operating system detection believes it is running on.
    pub fn target_os(&self) -> &str {
        &self.target_os
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.options.timeout
    }

    pub(crate) fn bypass(&self, force: bool) -> bool {
        force || self.options.bypass_cache
    }

    /// Fails with [`DetectError::UnsupportedPlatform`] off Windows.
    pub fn ensure_supported(&self) -> Result<()> {
        if self.target_os == SUPPORTED_OS {
            Ok(())
        } else {
            Err(DetectError::UnsupportedPlatform {
                platform: self.target_os.clone(),
            })
        }
    }

    /// Drops every cached result.
    pub fn clear_cache(&self) {
        self.families.clear();
        self.vswhere.clear();
        self.reports.clear();
        self.devices.clear();
    }

    /// Locates vswhere, caching the outcome (including "not found").
    pub async fn vswhere(&self, force: bool) -> Result<Option<VsWhere>> {
        self.ensure_supported()?;
        self.vswhere
            .get_or_compute(VSWHERE_CACHE_KEY, self.bypass(force), move || async move {
                Ok(VsWhere::locate(&self.options.vswhere_search_paths))
            })
            .await
    }

    /// Detects one family, or returns its cached result.
    ///
    /// # Arguments
    ///
    /// * `family` - The tool family to detect
    /// * `force` - Re-detect even if a cached result exists
    ///
    /// # Returns
    ///
    /// The shared result for `family`. Missing installs are issues on the
    /// result; only a timeout, a spawn failure or an unsupported platform is
    /// an `Err`.
    pub async fn detect_family(
        &self,
        family: ToolFamily,
        force: bool,
    ) -> Result<Arc<DetectionResult>> {
        self.ensure_supported()?;
        self.families
            .get_or_compute(family.cache_key(), self.bypass(force), move || async move {
                tracing::debug!(%family, "detecting");
                let result = match family {
                    ToolFamily::VisualStudio => visual_studio::detect(self, force).await?,
                    ToolFamily::WindowsSdk => windows_sdk::detect(self).await?,
                    ToolFamily::WindowsPhoneSdk => windows_phone::detect(self).await?,
                };
                Ok(Arc::new(result))
            })
            .await
    }

    /// Visual Studio installs from vswhere and the registry.
    pub async fn visual_studio(&self, force: bool) -> Result<Arc<DetectionResult>> {
        self.detect_family(ToolFamily::VisualStudio, force).await
    }

    /// Windows SDKs under the search paths and registry roots.
    pub async fn windows_sdks(&self, force: bool) -> Result<Arc<DetectionResult>> {
        self.detect_family(ToolFamily::WindowsSdk, force).await
    }

    /// Windows Phone SDKs registered on the host.
    pub async fn windows_phone_sdks(&self, force: bool) -> Result<Arc<DetectionResult>> {
        self.detect_family(ToolFamily::WindowsPhoneSdk, force).await
    }
}

/// Builder for [`DetectionContext`].
#[derive(Default)]
pub struct DetectionContextBuilder {
    runner: Option<Arc<dyn CommandRunner>>,
    options: DetectOptions,
    target_os: Option<String>,
}

impl DetectionContextBuilder {
    /// Runs subprocesses through `runner` instead of spawning them.
    pub fn runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Some(Arc::new(runner));
        self
    }

    /// Like [`runner`](Self::runner) for a runner the caller keeps a handle
    /// to.
    pub fn shared_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn options(mut self, options: DetectOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the detected operating system (`std::env::consts::OS`
    /// naming).
    pub fn target_os(mut self, os: impl Into<String>) -> Self {
        self.target_os = Some(os.into());
        self
    }

    /// Builds the context with empty caches. Without a runner, processes are
    /// spawned through [`SystemRunner`].
    pub fn build(self) -> DetectionContext {
        DetectionContext {
            runner: self.runner.unwrap_or_else(|| Arc::new(SystemRunner)),
            options: self.options,
            target_os: self
                .target_os
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            families: ResultCache::new(),
            vswhere: ResultCache::new(),
            reports: ResultCache::new(),
            devices: ResultCache::new(),
        }
    }
}
