//! Error types for detection and device operations.
//!
//! Expected "tool is missing" conditions are never errors: they are recorded
//! as [`Issue`](crate::Issue)s on the detection result. This enum covers the
//! conditions that abort an operation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Errors raised by detection and device operations.
///
/// # Example
///
/// ```rust
/// use wintoolchain_discovery::DetectError;
///
/// fn report(error: &DetectError) {
///     eprintln!("{}", error);
///     eprintln!("hint: {}", error.hint());
///     if error.is_timeout() {
///         eprintln!("the operation may succeed if retried");
///     }
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DetectError {
    /// Detection only runs on Windows.
    #[error("Unsupported platform \"{platform}\"")]
    UnsupportedPlatform {
        /// The operating system the caller is running on.
        platform: String,
    },

    /// A caller supplied an argument that can never succeed.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument.
        message: String,
    },

    /// A candidate install is missing required files or has inconsistent
    /// metadata. Scanners discard the candidate when they see this.
    #[error("{message}")]
    InvalidInstall {
        /// Which artifact was missing or mismatched.
        message: String,
    },

    /// An external tool ran but reported failure.
    #[error("Failed to run {program}: {message}")]
    ToolFailed {
        /// The program that was executed.
        program: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// First meaningful line of the tool's output.
        message: String,
    },

    /// An operation did not complete in time. The underlying subprocess has
    /// been killed.
    #[error("Timed out after {duration:?} waiting for {operation}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// How long the operation was allowed to run.
        duration: Duration,
    },

    /// Permission was denied spawning a process or reading a file.
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// What permission was denied.
        message: String,
    },

    /// Structured output from an external tool could not be parsed.
    #[error("Failed to parse JSON output from {program}: {source}")]
    Json {
        /// The program whose output was being parsed.
        program: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A manifest file exists but could not be parsed.
    #[error("Invalid manifest {}: {message}", path.display())]
    Manifest {
        /// Path of the manifest.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// No device or emulator matched the request.
    #[error("{message}")]
    DeviceNotFound {
        /// Describes what was searched for.
        message: String,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectError {
    pub(crate) fn invalid_install(message: impl Into<String>) -> Self {
        Self::InvalidInstall {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns `true` when the operation failed because it ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// An actionable suggestion for resolving the error.
    ///
    /// ```rust
    /// use wintoolchain_discovery::DetectError;
    ///
    /// let error = DetectError::UnsupportedPlatform { platform: "linux".into() };
    /// assert!(error.hint().contains("Windows"));
    /// ```
    pub fn hint(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform { .. } => "Run this on a Windows host",
            Self::InvalidArgument { .. } => "Check the arguments passed to the call",
            Self::InvalidInstall { .. } => "Repair or reinstall the affected tool",
            Self::ToolFailed { .. } => "See the tool output for details",
            Self::Timeout { .. } => "Retry with a longer timeout",
            Self::PermissionDenied { .. } => "Try running with appropriate permissions",
            Self::Json { .. } => "Make sure the installed tool is up to date",
            Self::Manifest { .. } => "Repair or reinstall the affected SDK",
            Self::DeviceNotFound { .. } => {
                "Connect a device or install the Windows Phone emulator"
            }
            Self::Io(_) => "Check that the path exists and is readable",
        }
    }
}
