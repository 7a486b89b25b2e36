//! Enumerate, connect, launch, install and stop targets.

use super::process::{self, emulator_processes};
use super::{
    parse_targets, DeviceEnumeration, DeviceHandle, DeviceKind, DeviceState, LaunchOptions,
};
use crate::context::DetectionContext;
use crate::issue::{record_issue, Issue, IssueId};
use crate::runner::CommandOutput;
use crate::tool_install::DetectionResult;
use crate::{DetectError, Result};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};

const DEVICES_CACHE_KEY: &str = "devices";

/// Minimum time an emulator gets between launch and stop.
const LAUNCH_SETTLE: Duration = Duration::from_millis(250);

/// Wait after killing an emulator before asking Hyper-V to stop it.
const KILL_SETTLE: Duration = Duration::from_secs(1);

fn enumerate_args() -> Vec<String> {
    vec!["/EnumerateDevices".to_string()]
}

/// First line of the tool output with any `Error: ` prefix removed.
fn install_failure_message(output: &CommandOutput) -> String {
    let combined = output.combined();
    let first = combined.trim().lines().next().unwrap_or("").trim();
    match first.strip_prefix("Error: ") {
        Some(message) => message.to_string(),
        None => format!(
            "Failed to install app (code {})",
            output.code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
        ),
    }
}

fn hyperv_stop_command(name: &str) -> String {
    format!(
        "Get-VM -Name '{}*' | Stop-VM -TurnOff -Force",
        name.replace('\'', "''")
    )
}

impl DetectionContext {
    fn launch_timeout(&self, opts: &LaunchOptions) -> Duration {
        opts.timeout
            .unwrap_or_else(|| self.timeout())
            .max(Duration::from_millis(1))
    }

    /// Lists devices and emulators from every Windows Phone SDK that has a
    /// deploy tool. Listing failures become issues.
    pub async fn enumerate_devices(&self, force: bool) -> Result<Arc<DeviceEnumeration>> {
        self.ensure_supported()?;
        let sdks = self.windows_phone_sdks(force).await?;
        self.enumerate_from(&sdks, force).await
    }

    /// Cached enumeration over an already detected set of SDKs.
    pub(crate) async fn enumerate_from(
        &self,
        sdks: &DetectionResult,
        force: bool,
    ) -> Result<Arc<DeviceEnumeration>> {
        self.devices
            .get_or_compute(DEVICES_CACHE_KEY, self.bypass(force), move || async move {
                self.run_enumeration(sdks).await.map(Arc::new)
            })
            .await
    }

    async fn run_enumeration(&self, sdks: &DetectionResult) -> Result<DeviceEnumeration> {
        let tools: Vec<(String, PathBuf)> = sdks
            .installs
            .iter()
            .filter_map(|install| {
                let deploy_cmd = install.windows_phone_sdk()?.deploy_cmd.clone()?;
                Some((install.version.clone(), deploy_cmd))
            })
            .collect();

        let args = enumerate_args();
        let outputs = join_all(tools.iter().map(|(_, deploy_cmd)| {
            self.runner()
                .run(deploy_cmd.as_os_str(), &args, self.timeout())
        }))
        .await;

        let mut enumeration = DeviceEnumeration::default();
        for ((version, deploy_cmd), output) in tools.into_iter().zip(outputs) {
            let output = match output {
                Ok(output) if output.success() => output,
                Err(e) if e.is_timeout() => return Err(e),
                other => {
                    tracing::warn!(
                        sdk = %version,
                        result = ?other.map(|o| o.code),
                        "device enumeration failed"
                    );
                    record_issue(
                        &mut enumeration.issues,
                        Issue::error(IssueId::WindowsPhoneEnumerateDevicesFailed),
                    );
                    continue;
                }
            };

            let handles: Vec<DeviceHandle> = parse_targets(&output.stdout)
                .into_iter()
                .map(|(index, name)| DeviceHandle::new(&version, deploy_cmd.clone(), index, &name))
                .collect();
            if !handles.iter().any(DeviceHandle::is_emulator) {
                record_issue(
                    &mut enumeration.issues,
                    Issue::error(IssueId::WindowsPhoneEmulatorNotInstalled),
                );
            }
            tracing::debug!(sdk = %version, count = handles.len(), "enumerated targets");
            enumeration.devices.extend(handles);
        }
        Ok(enumeration)
    }

    /// Confirms the target is reachable through its deploy tool.
    ///
    /// On timeout the handle moves to [`DeviceState::TimedOut`] and a
    /// [`DetectError::Timeout`] is returned. Other failures leave it
    /// [`DeviceState::Enumerated`].
    pub async fn connect(
        &self,
        handle: &mut DeviceHandle,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.ensure_supported()?;
        if handle.is_active() {
            return Ok(());
        }
        let limit = timeout.unwrap_or_else(|| self.timeout()).max(Duration::from_millis(1));
        handle.state = DeviceState::Connecting;

        let output = match self
            .runner()
            .run(handle.deploy_cmd.as_os_str(), &enumerate_args(), limit)
            .await
        {
            Ok(output) => output,
            Err(e) if e.is_timeout() => {
                handle.state = DeviceState::TimedOut;
                return Err(DetectError::Timeout {
                    operation: format!("connecting to \"{}\"", handle.name),
                    duration: limit,
                });
            }
            Err(e) => {
                handle.state = DeviceState::Enumerated;
                return Err(e);
            }
        };

        let output = match output.into_success(handle.deploy_cmd.as_os_str()) {
            Ok(output) => output,
            Err(e) => {
                handle.state = DeviceState::Enumerated;
                return Err(e);
            }
        };

        let listed = parse_targets(&output.stdout)
            .into_iter()
            .any(|(index, name)| index == handle.index && name == handle.name);
        if !listed {
            handle.state = DeviceState::Enumerated;
            return Err(DetectError::DeviceNotFound {
                message: format!("\"{}\" is no longer listed by the deploy tool", handle.name),
            });
        }

        handle.state = DeviceState::Connected;
        tracing::info!(udid = %handle.udid, name = %handle.name, "connected");
        Ok(())
    }

    /// Installs `app_path` on the target, launching it unless `skip_launch`.
    pub async fn install_app(
        &self,
        handle: &mut DeviceHandle,
        app_path: &Path,
        skip_launch: bool,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.ensure_supported()?;
        let limit = timeout.unwrap_or_else(|| self.timeout()).max(Duration::from_millis(1));
        let args = vec![
            if skip_launch { "/install" } else { "/installlaunch" }.to_string(),
            app_path.to_string_lossy().into_owned(),
            format!("/targetdevice:{}", handle.index),
        ];

        let output = match self
            .runner()
            .run(handle.deploy_cmd.as_os_str(), &args, limit)
            .await
        {
            Ok(output) => output,
            Err(e) if e.is_timeout() => {
                handle.state = DeviceState::TimedOut;
                return Err(DetectError::Timeout {
                    operation: format!("installing to \"{}\"", handle.name),
                    duration: limit,
                });
            }
            Err(e) => return Err(e),
        };

        if !output.success() {
            return Err(DetectError::ToolFailed {
                program: handle.deploy_cmd.to_string_lossy().into_owned(),
                exit_code: output.code,
                message: install_failure_message(&output),
            });
        }

        handle.state = DeviceState::Running;
        tracing::info!(udid = %handle.udid, app = %app_path.display(), "installed");
        Ok(())
    }

    /// Picks a target and brings it up.
    ///
    /// Without a `udid` the first emulator (of `opts.sdk_version`, if set)
    /// is used. With `opts.app_path` the app is installed, otherwise the
    /// target is only connected.
    ///
    /// # Arguments
    ///
    /// * `udid` - Target to launch, or `None` for the first emulator
    /// * `opts` - App, SDK filter, kill and timeout settings
    ///
    /// # Returns
    ///
    /// The handle in [`DeviceState::Connected`] or [`DeviceState::Running`]
    /// with its start time set. Fails with
    /// [`DetectError::DeviceNotFound`] when no target matches.
    pub async fn launch(&self, udid: Option<&str>, opts: &LaunchOptions) -> Result<DeviceHandle> {
        self.ensure_supported()?;
        let enumeration = self.enumerate_devices(false).await?;
        let sdk_filter = |d: &&DeviceHandle| {
            opts.sdk_version
                .as_deref()
                .map_or(true, |wanted| d.sdk_version == wanted)
        };

        let found = match udid {
            Some(udid) => enumeration
                .devices
                .iter()
                .filter(sdk_filter)
                .find(|d| d.udid == udid)
                .ok_or_else(|| DetectError::DeviceNotFound {
                    message: format!(
                        "Unable to find a Windows Phone emulator with the UDID \"{udid}\""
                    ),
                })?,
            None => enumeration
                .emulators()
                .find(sdk_filter)
                .ok_or_else(|| DetectError::DeviceNotFound {
                    message: match &opts.sdk_version {
                        Some(version) => {
                            format!("Unable to find a Windows Phone {version} emulator.")
                        }
                        None => "Unable to find a Windows Phone emulator.".to_string(),
                    },
                })?,
        };

        if let Some(app) = &opts.app_path {
            if !app.exists() {
                return Err(DetectError::invalid_argument(format!(
                    "App path does not exist: {}",
                    app.display()
                )));
            }
        }

        let mut handle = found.clone();
        let limit = self.launch_timeout(opts);

        if opts.kill_if_running && handle.is_emulator() {
            self.kill_emulator(&handle).await?;
        }
        handle.started_at = Some(Instant::now());

        match &opts.app_path {
            Some(app) => {
                self.install_app(&mut handle, app, opts.skip_launch, Some(limit))
                    .await?
            }
            None => self.connect(&mut handle, Some(limit)).await?,
        }
        Ok(handle)
    }

    /// Installs `app_path` on the chosen target, launching it first if
    /// needed.
    pub async fn install(
        &self,
        udid: Option<&str>,
        app_path: &Path,
        opts: &LaunchOptions,
    ) -> Result<DeviceHandle> {
        if app_path.as_os_str().is_empty() {
            return Err(DetectError::invalid_argument("Missing app path argument"));
        }
        if !app_path.exists() {
            return Err(DetectError::invalid_argument(format!(
                "App path does not exist: {}",
                app_path.display()
            )));
        }
        let opts = LaunchOptions {
            app_path: Some(app_path.to_path_buf()),
            ..opts.clone()
        };
        self.launch(udid, &opts).await
    }

    /// Whether an emulator window for the handle is open. Physical devices
    /// report their handle state.
    pub async fn is_running(&self, handle: &DeviceHandle) -> Result<bool> {
        self.ensure_supported()?;
        if handle.kind == DeviceKind::Device {
            return Ok(handle.is_active());
        }
        let processes = process::list(self.runner(), self.timeout()).await?;
        let running = emulator_processes(&processes, &handle.name).next().is_some();
        Ok(running)
    }

    /// Stops the target.
    ///
    /// A handle that was never started, or is already stopped, returns
    /// immediately without touching any process. Otherwise each matching
    /// emulator process is killed in turn, followed by a settling delay and
    /// a Hyper-V turn-off. Every process is attempted; failures are reported
    /// together afterwards.
    pub async fn stop(&self, handle: &mut DeviceHandle) -> Result<()> {
        let never_started = handle.started_at.is_none() && !handle.is_active();
        if never_started || handle.state == DeviceState::Stopped {
            tracing::debug!(udid = %handle.udid, "nothing to stop");
            return Ok(());
        }
        self.ensure_supported()?;

        if handle.kind == DeviceKind::Device {
            handle.state = DeviceState::Stopped;
            handle.started_at = None;
            return Ok(());
        }

        if let Some(started) = handle.started_at {
            sleep_until(started + LAUNCH_SETTLE).await;
        }
        self.kill_emulator(handle).await?;

        handle.state = DeviceState::Stopped;
        handle.started_at = None;
        tracing::info!(udid = %handle.udid, "stopped");
        Ok(())
    }

    /// Kills every emulator process for the handle, whatever its state.
    /// Every process is attempted before failures are reported.
    async fn kill_emulator(&self, handle: &DeviceHandle) -> Result<()> {
        let processes = process::list(self.runner(), self.timeout()).await?;
        let mut failures = Vec::new();
        for proc_info in emulator_processes(&processes, &handle.name) {
            if let Err(e) = self.stop_emulator_process(proc_info.pid, &handle.name).await {
                tracing::warn!(
                    pid = proc_info.pid,
                    error = %e,
                    "failed to stop emulator process"
                );
                failures.push(format!("pid {}: {}", proc_info.pid, e));
            }
        }

        if !failures.is_empty() {
            return Err(DetectError::ToolFailed {
                program: "xde.exe".to_string(),
                exit_code: None,
                message: format!("Failed to stop emulator ({})", failures.join("; ")),
            });
        }
        Ok(())
    }

    async fn stop_emulator_process(&self, pid: u32, name: &str) -> Result<()> {
        process::kill(self.runner(), pid, self.timeout()).await?;
        sleep(KILL_SETTLE).await;

        let powershell = self.options().powershell.as_os_str();
        let args = vec![
            "-NoLogo".to_string(),
            "-NonInteractive".to_string(),
            "-NoProfile".to_string(),
            "-Command".to_string(),
            hyperv_stop_command(name),
        ];
        self.runner()
            .run(powershell, &args, self.timeout())
            .await?
            .into_success(powershell)?;
        Ok(())
    }
}
