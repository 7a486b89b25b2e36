//! CLI argument parsing using clap derive macros

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use wintoolchain_discovery::{
    DetectOptions, DetectionContext, DeviceHandle, DeviceState, LaunchOptions, ToolFamily,
};

/// Windows toolchain discovery
///
/// Finds Visual Studio, Windows SDKs, Windows Phone SDKs and their devices
/// and emulators. Results are printed to stdout as JSON.
#[derive(Parser, Debug)]
#[command(name = "wintoolchain")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Ignore cached results and re-detect
    #[arg(long, global = true)]
    pub bypass_cache: bool,

    /// Timeout for each external tool, in milliseconds
    ///
    /// Falls back to `WINTOOLCHAIN_TIMEOUT_MS`, where a malformed value is
    /// ignored with a warning.
    #[arg(long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Preferred Visual Studio version
    #[arg(long, global = true, env = "WINTOOLCHAIN_VS_VERSION")]
    pub vs_version: Option<String>,

    /// Preferred Windows SDK version
    #[arg(long, global = true, env = "WINTOOLCHAIN_SDK_VERSION")]
    pub sdk_version: Option<String>,

    /// Preferred Windows Phone SDK version
    #[arg(long, global = true, env = "WINTOOLCHAIN_WPSDK_VERSION")]
    pub wpsdk_version: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect installed tooling
    Detect {
        /// Only detect one family
        #[arg(long, value_enum)]
        family: Option<FamilyArg>,
    },

    /// List Windows Phone devices and emulators
    Devices,

    /// Start an emulator or connect to a device
    Launch {
        /// UDID of the target, defaults to the first emulator
        #[arg(long)]
        target: Option<String>,

        /// App package to install and launch
        #[arg(long)]
        app: Option<PathBuf>,

        /// Only consider emulators of this Windows Phone SDK version
        #[arg(long, value_name = "VERSION")]
        sdk: Option<String>,

        /// Install the app without launching it
        #[arg(long)]
        skip_launch: bool,

        /// Stop the emulator first if it is already running
        #[arg(long)]
        kill_if_running: bool,
    },

    /// Install an app on a device or emulator
    Install {
        /// App package to install
        #[arg(long)]
        app: PathBuf,

        /// UDID of the target, defaults to the first emulator
        #[arg(long)]
        target: Option<String>,

        /// Only consider emulators of this Windows Phone SDK version
        #[arg(long, value_name = "VERSION")]
        sdk: Option<String>,

        /// Install the app without launching it
        #[arg(long)]
        skip_launch: bool,
    },

    /// Stop a running emulator
    Stop {
        /// UDID of the target
        #[arg(long)]
        target: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FamilyArg {
    /// Visual Studio
    Vs,
    /// Windows SDK
    Sdk,
    /// Windows Phone SDK
    Wpsdk,
}

impl From<FamilyArg> for ToolFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Vs => ToolFamily::VisualStudio,
            FamilyArg::Sdk => ToolFamily::WindowsSdk,
            FamilyArg::Wpsdk => ToolFamily::WindowsPhoneSdk,
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

impl Cli {
    /// Environment defaults overlaid with command-line flags.
    pub fn options(&self) -> DetectOptions {
        let mut opts = DetectOptions::from_env();
        opts.bypass_cache = self.bypass_cache;
        if let Some(ms) = self.timeout {
            opts.timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(version) = &self.vs_version {
            opts.visual_studio.preferred_version = Some(version.clone());
        }
        if let Some(version) = &self.sdk_version {
            opts.windows_sdk.preferred_version = Some(version.clone());
        }
        if let Some(version) = &self.wpsdk_version {
            opts.windows_phone.preferred_version = Some(version.clone());
        }
        opts
    }

    /// Launch settings for `launch` and `install`. Other commands get the
    /// defaults.
    fn launch_options(&self) -> LaunchOptions {
        let opts = match &self.command {
            Commands::Launch {
                app,
                sdk,
                skip_launch,
                kill_if_running,
                ..
            } => LaunchOptions {
                sdk_version: sdk.clone(),
                app_path: app.clone(),
                skip_launch: *skip_launch,
                kill_if_running: *kill_if_running,
                ..Default::default()
            },
            Commands::Install {
                sdk,
                skip_launch,
                ..
            } => LaunchOptions {
                sdk_version: sdk.clone(),
                skip_launch: *skip_launch,
                ..Default::default()
            },
            _ => LaunchOptions::default(),
        };
        match self.timeout {
            Some(ms) => opts.with_timeout(Duration::from_millis(ms)),
            None => opts,
        }
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let ctx = DetectionContext::new(self.options());
        let force = self.bypass_cache;

        match &self.command {
            Commands::Detect { family: None } => print_json(&*ctx.detect(force).await?),
            Commands::Detect {
                family: Some(family),
            } => print_json(&*ctx.detect_family((*family).into(), force).await?),
            Commands::Devices => print_json(&*ctx.enumerate_devices(force).await?),
            Commands::Launch { target, .. } => {
                let opts = self.launch_options();
                print_json(&ctx.launch(target.as_deref(), &opts).await?)
            }
            Commands::Install { app, target, .. } => {
                let opts = self.launch_options();
                print_json(&ctx.install(target.as_deref(), app, &opts).await?)
            }
            Commands::Stop { target } => {
                let mut handle = find_target(&ctx, target).await?;
                // Handles do not outlive a process, so adopt a running emulator.
                if ctx.is_running(&handle).await? {
                    handle.state = DeviceState::Running;
                }
                ctx.stop(&mut handle).await?;
                print_json(&handle)
            }
        }
    }
}

async fn find_target(ctx: &DetectionContext, udid: &str) -> Result<DeviceHandle> {
    let enumeration = ctx.enumerate_devices(false).await?;
    enumeration
        .by_udid(udid)
        .cloned()
        .with_context(|| {
            format!("Unable to find a Windows Phone emulator with the UDID \"{udid}\"")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_options() {
        let cli = Cli::parse_from([
            "wintoolchain",
            "--bypass-cache",
            "--timeout",
            "0",
            "--wpsdk-version",
            "8.1",
            "detect",
            "--family",
            "wpsdk",
        ]);
        let opts = cli.options();
        assert!(opts.bypass_cache);
        assert_eq!(opts.timeout, Duration::from_millis(1));
        assert_eq!(opts.windows_phone.preferred_version.as_deref(), Some("8.1"));
        assert!(matches!(
            cli.command,
            Commands::Detect {
                family: Some(FamilyArg::Wpsdk)
            }
        ));
    }

    #[test]
    fn test_install_requires_app() {
        assert!(Cli::try_parse_from(["wintoolchain", "install"]).is_err());
        let cli = Cli::try_parse_from([
            "wintoolchain",
            "install",
            "--app",
            "a.xap",
            "--target",
            "8.1:1",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Install { ref target, .. } if target.as_deref() == Some("8.1:1")
        ));
    }

    #[test]
    fn test_launch_options_floor_timeout() {
        let cli = Cli::parse_from(["wintoolchain", "--timeout", "0", "devices"]);
        assert_eq!(cli.launch_options().timeout, Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_launch_sdk_filter_is_separate_from_preferred_version() {
        let cli = Cli::parse_from([
            "wintoolchain",
            "--wpsdk-version",
            "8.0",
            "launch",
            "--sdk",
            "8.1",
            "--kill-if-running",
        ]);
        let opts = cli.launch_options();
        assert_eq!(opts.sdk_version.as_deref(), Some("8.1"));
        assert!(opts.kill_if_running);
        assert_eq!(
            cli.options().windows_phone.preferred_version.as_deref(),
            Some("8.0")
        );

        let cli = Cli::parse_from(["wintoolchain", "--wpsdk-version", "8.0", "launch"]);
        assert_eq!(cli.launch_options().sdk_version, None);

        let cli = Cli::parse_from(["wintoolchain", "install", "--app", "a.xap", "--sdk", "8.1"]);
        assert_eq!(cli.launch_options().sdk_version.as_deref(), Some("8.1"));
    }

    #[test]
    fn test_timeout_env_is_left_to_detect_options() {
        let command = Cli::command();
        let timeout = command
            .get_arguments()
            .find(|arg| arg.get_id() == "timeout")
            .unwrap();
        assert!(timeout.get_env().is_none());
    }
}
