//! Detection implementation submodule.
//!
//! Internal building blocks shared by the family scanners:
//!
//! - `registry`: `reg query` invocation and output parsing
//! - `manifest`: `SDKManifest.xml` / `Platform.xml` parsing
//! - `path_finder`: `%VAR%` expansion and executable lookup
//! - `version`: numeric version ordering and range checks
//! - `selector`: choosing one install per family

pub(crate) mod manifest;
pub(crate) mod path_finder;
pub(crate) mod registry;
pub(crate) mod selector;
pub(crate) mod version;
