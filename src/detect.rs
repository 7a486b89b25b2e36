//! Full-environment detection.

use crate::context::DetectionContext;
use crate::environment;
use crate::merge::merge_all;
use crate::report::Report;
use crate::tool_install::DetectionResult;
use crate::{Result, ToolFamily};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

const REPORT_CACHE_KEY: &str = "report";

impl DetectionContext {
    /// Detects every tool family and checks the host environment.
    ///
    /// The families, the OS query and the PowerShell check run concurrently.
    /// Once they finish, MSBuild is checked against the selected Visual
    /// Studio while devices are enumerated through the Windows Phone SDKs.
    /// Every partial result is then merged into one [`Report`].
    ///
    /// Missing tools are reported as issues. Any hard failure (a timeout, a
    /// tool that could not be spawned) fails the whole call and nothing is
    /// cached.
    ///
    /// # Arguments
    ///
    /// * `force` - Ignore every cached result, including per-family ones
    ///
    /// # Returns
    ///
    /// The merged [`Report`], shared with later non-forced calls.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use wintoolchain_discovery::{DetectOptions, DetectionContext};
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() {
    ///     let ctx = DetectionContext::new(DetectOptions::default());
    ///     match ctx.detect(false).await {
    ///         Ok(report) => {
    ///             for (version, sdk) in &report.windows_sdk {
    ///                 println!("Windows SDK {version}: selected={}", sdk.selected);
    ///             }
    ///         }
    ///         Err(e) => eprintln!("detection failed: {e} ({})", e.hint()),
    ///     }
    /// }
    /// ```
    pub async fn detect(&self, force: bool) -> Result<Arc<Report>> {
        self.ensure_supported()?;
        self.reports
            .get_or_compute(REPORT_CACHE_KEY, self.bypass(force), move || async move {
                self.build_report(force).await.map(Arc::new)
            })
            .await
    }

    async fn build_report(&self, force: bool) -> Result<Report> {
        let (os, visual_studio, windows_sdk, windows_phone, powershell) = tokio::try_join!(
            environment::check_os(self),
            self.visual_studio(force),
            self.windows_sdks(force),
            self.windows_phone_sdks(force),
            environment::check_powershell(self),
        )?;

        let (msbuild, devices) = tokio::try_join!(
            environment::check_msbuild(self, visual_studio.selected()),
            self.enumerate_from(&windows_phone, force),
        )?;

        let report = merge_all([
            os,
            Report::from_family(&visual_studio),
            Report::from_family(&windows_sdk),
            Report::from_family(&windows_phone),
            msbuild,
            Report::from_devices(&devices),
            powershell,
        ]);
        tracing::info!(
            issues = report.issues.len(),
            devices = report.devices.len(),
            "detection finished"
        );
        Ok(report)
    }

    /// Detects every tool family in parallel, without the environment
    /// checks.
    pub async fn detect_all_families(
        &self,
        force: bool,
    ) -> Result<BTreeMap<ToolFamily, Arc<DetectionResult>>> {
        self.ensure_supported()?;
        let results = try_join_all(ToolFamily::all().map(|family| async move {
            self.detect_family(family, force)
                .await
                .map(|result| (family, result))
        }))
        .await?;
        Ok(results.into_iter().collect())
    }
}
