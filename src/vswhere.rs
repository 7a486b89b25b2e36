//! Wrapper around the Visual Studio Locator (`vswhere.exe`).

use crate::detection::path_finder::{find_executable, has_exe_extension};
use crate::runner::CommandRunner;
use crate::{DetectError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Component required for an instance to ship MSBuild.
pub const MSBUILD_COMPONENT: &str = "Microsoft.Component.MSBuild";

/// Pattern passed to `-find` to locate `MSBuild.exe` inside an instance.
pub const MSBUILD_FIND_PATTERN: &str = r"MSBuild\**\Bin\MSBuild.exe";

/// Filters for a vswhere query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Component ids every returned instance must have.
    pub requires: Vec<String>,
    /// File glob to search for within each instance. When set, vswhere
    /// returns matching file paths instead of instance objects.
    pub find: Option<String>,
    /// Version range such as `[15.0,16.0)`. A bare version `v` is sent as
    /// `[v]`.
    pub version: Option<String>,
}

impl QueryOptions {
    fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-nologo", "-format", "json", "-utf8"]
            .into_iter()
            .map(String::from)
            .collect();
        if !self.requires.is_empty() {
            args.push("-requires".to_string());
            args.extend(self.requires.iter().cloned());
        }
        if let Some(find) = &self.find {
            args.push("-find".to_string());
            args.push(find.clone());
        }
        if let Some(version) = &self.version {
            args.push("-version".to_string());
            if version.starts_with('[') || version.starts_with('(') {
                args.push(version.clone());
            } else {
                args.push(format!("[{version}]"));
            }
        }
        args
    }
}

/// One Visual Studio instance as reported by vswhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsInstance {
    pub display_name: String,
    pub installation_path: PathBuf,
    pub installation_version: String,
    #[serde(default = "default_true")]
    pub is_complete: bool,
    #[serde(default)]
    pub product_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A validated `vswhere.exe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VsWhere {
    exe: PathBuf,
}

impl VsWhere {
    /// Wraps `exe` after checking it is an existing `.exe` file.
    pub fn new(exe: impl Into<PathBuf>) -> Result<Self> {
        let exe = exe.into();
        if exe.as_os_str().is_empty() {
            return Err(DetectError::invalid_argument(
                "Expected executable to be a non-empty path",
            ));
        }
        if !has_exe_extension(&exe) {
            return Err(DetectError::invalid_argument(
                "Executable must have a .exe extension",
            ));
        }
        if !exe.is_file() {
            return Err(DetectError::invalid_argument(
                "Executable does not exist or is not a file",
            ));
        }
        Ok(Self { exe })
    }

    /// Searches `search_paths` (files or directories, `%VAR%` expanded) and
    /// then `PATH` for vswhere.
    pub fn locate(search_paths: &[String]) -> Option<Self> {
        let found = find_executable(search_paths, "vswhere.exe")?;
        match Self::new(&found) {
            Ok(vswhere) => {
                tracing::debug!(path = %found.display(), "found vswhere");
                Some(vswhere)
            }
            Err(e) => {
                tracing::debug!(path = %found.display(), error = %e, "rejected vswhere candidate");
                None
            }
        }
    }

    /// Path to `vswhere.exe`.
    pub fn path(&self) -> &Path {
        &self.exe
    }

    /// Runs vswhere and deserializes its JSON array output.
    pub async fn query<T: DeserializeOwned>(
        &self,
        runner: &dyn CommandRunner,
        opts: &QueryOptions,
        limit: Duration,
    ) -> Result<Vec<T>> {
        let output = runner
            .run(self.exe.as_os_str(), &opts.to_args(), limit)
            .await?
            .into_success(self.exe.as_os_str())?;

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(stdout).map_err(|source| DetectError::Json {
            program: "vswhere".to_string(),
            source,
        })
    }

    /// Lists instances. Entries missing a display name, path or version are
    /// skipped.
    pub async fn instances(
        &self,
        runner: &dyn CommandRunner,
        opts: &QueryOptions,
        limit: Duration,
    ) -> Result<Vec<VsInstance>> {
        let raw: Vec<serde_json::Value> = self.query(runner, opts, limit).await?;
        Ok(raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<VsInstance>(value) {
                Ok(instance) => Some(instance),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed vswhere instance");
                    None
                }
            })
            .collect())
    }

    /// Path of `MSBuild.exe` for the instance with `version`, if any.
    pub async fn find_msbuild(
        &self,
        runner: &dyn CommandRunner,
        version: &str,
        limit: Duration,
    ) -> Result<Option<PathBuf>> {
        let opts = QueryOptions {
            requires: vec![MSBUILD_COMPONENT.to_string()],
            find: Some(MSBUILD_FIND_PATTERN.to_string()),
            version: Some(version.to_string()),
        };
        let found: Vec<PathBuf> = self.query(runner, &opts, limit).await?;
        Ok(found.into_iter().next())
    }
}
