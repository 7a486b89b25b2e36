//! Search-path expansion and executable lookup.

use regex::Regex;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn env_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%([^%]+)%").expect("Invalid env reference regex"))
}

/// Expands `%VAR%` references using the process environment. Unset
/// variables are left verbatim.
pub(crate) fn expand_path(path: &str) -> PathBuf {
    expand_with(path, |name| std::env::var(name).ok())
}

pub(crate) fn expand_with<F>(path: &str, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let expanded: Cow<'_, str> = env_reference().replace_all(path, |caps: &regex::Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    PathBuf::from(expanded.into_owned())
}

/// `true` if `path` names an existing file with an `.exe` extension.
pub(crate) fn is_exe_file(path: &Path) -> bool {
    has_exe_extension(path) && path.is_file()
}

pub(crate) fn has_exe_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("exe"))
        .unwrap_or(false)
}

/// Finds an executable by walking `search_paths`.
///
/// Each entry is either a path to an `.exe` file or a directory whose
/// `.exe` files are tried in name order, `preferred_name` first. If nothing
/// matches, `preferred_name` is looked up on `PATH`.
pub(crate) fn find_executable(search_paths: &[String], preferred_name: &str) -> Option<PathBuf> {
    for entry in search_paths {
        let path = expand_path(entry);
        if has_exe_extension(&path) {
            if path.is_file() {
                return Some(path);
            }
            continue;
        }
        if path.is_dir() {
            if let Some(found) = find_in_dir(&path, preferred_name) {
                return Some(found);
            }
        }
    }

    // Fallback: PATH lookup via which crate
    which::which(preferred_name).ok().filter(|p| has_exe_extension(p))
}

fn find_in_dir(dir: &Path, preferred_name: &str) -> Option<PathBuf> {
    let preferred = dir.join(preferred_name);
    if is_exe_file(&preferred) {
        return Some(preferred);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_exe_file(path))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
