//! Version comparison and supported-range checks.
//!
//! Windows tool versions are dotted numbers of varying length (`12.0`,
//! `8.1`, `10.0.17763.0`, `15.9.28307.1525`) rather than semver. They are
//! compared component by component, and mapped onto the first three
//! components for range checks against a [`VersionReq`].

use crate::tool_install::Supported;
use regex::Regex;
use semver::{Op, Version, VersionReq};
use std::cmp::Ordering;
use std::sync::OnceLock;

fn leading_numbers() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v?(\d+(?:\.\d+)*)").expect("Invalid version regex"))
}

/// Numeric components of a version string. A leading `v` and any
/// non-numeric suffix are ignored.
pub(crate) fn components(version: &str) -> Vec<u64> {
    leading_numbers()
        .captures(version.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .split('.')
                .filter_map(|part| part.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Integer prefix of a version string (`"10.0.17763.0"` → `10`).
pub(crate) fn major_version(version: &str) -> Option<u32> {
    components(version)
        .first()
        .and_then(|major| u32::try_from(*major).ok())
}

/// Orders versions numerically, treating missing components as zero.
/// Unparseable versions sort before parseable ones, then lexically.
pub(crate) fn compare_versions(a: &str, b: &str) -> Ordering {
    let (ca, cb) = (components(a), components(b));
    match (ca.is_empty(), cb.is_empty()) {
        (true, true) => return a.cmp(b),
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    let len = ca.len().max(cb.len());
    for i in 0..len {
        let x = ca.get(i).copied().unwrap_or(0);
        let y = cb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Maps a dotted version onto semver using its first three components.
pub(crate) fn to_semver(version: &str) -> Option<Version> {
    let parts = components(version);
    if parts.is_empty() {
        return None;
    }
    Some(Version::new(
        parts[0],
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    ))
}

/// Checks `version` against `range`.
///
/// When `allow_maybe` is set, a version that fails only the upper bounds of
/// the range is reported as [`Supported::Maybe`]. No range means every
/// version is supported. An unparseable range or version is unsupported.
pub(crate) fn satisfies(version: &str, range: Option<&str>, allow_maybe: bool) -> Supported {
    let Some(range) = range else {
        return Supported::Yes;
    };
    let req = match VersionReq::parse(range) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(range, error = %e, "ignoring unparseable version range");
            return Supported::No;
        }
    };
    let Some(version) = to_semver(version) else {
        return Supported::No;
    };
    if req.matches(&version) {
        return Supported::Yes;
    }
    if !allow_maybe {
        return Supported::No;
    }

    let only_upper_bounds_fail = req.comparators.iter().all(|comparator| {
        comparator.matches(&version) || matches!(comparator.op, Op::Less | Op::LessEq)
    });
    if only_upper_bounds_fail {
        Supported::Maybe
    } else {
        Supported::No
    }
}
