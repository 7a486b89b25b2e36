//! Picks the one install per family that callers should use.

use super::version::compare_versions;
use crate::tool_install::ToolInstall;
use std::cmp::Ordering;

/// Marks at most one of `installs` as selected.
///
/// The preferred version wins if it is present and compatible. Otherwise
/// the highest compatible version is chosen; on equal versions the first
/// one in scan order is kept. If nothing is compatible, nothing is selected.
pub(crate) fn select(installs: &mut [ToolInstall], preferred: Option<&str>) -> Option<usize> {
    for install in installs.iter_mut() {
        install.selected = false;
    }

    let chosen = preferred
        .and_then(|wanted| find_preferred(installs, wanted))
        .or_else(|| highest_compatible(installs));

    if let Some(index) = chosen {
        installs[index].selected = true;
        tracing::debug!(
            family = %installs[index].family,
            version = %installs[index].version,
            "selected install"
        );
    }
    chosen
}

fn find_preferred(installs: &[ToolInstall], wanted: &str) -> Option<usize> {
    let compatible = |install: &ToolInstall| install.supported.is_compatible();
    let exact = installs
        .iter()
        .position(|install| install.version == wanted && compatible(install));
    exact.or_else(|| {
        installs.iter().position(|install| {
            compatible(install) && compare_versions(&install.version, wanted) == Ordering::Equal
        })
    })
}

fn highest_compatible(installs: &[ToolInstall]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, install) in installs.iter().enumerate() {
        if !install.supported.is_compatible() {
            continue;
        }
        match best {
            Some(current)
                if compare_versions(&install.version, &installs[current].version)
                    != Ordering::Greater => {}
            _ => best = Some(index),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_install::{InstallDetails, Supported, WindowsPhoneSdkDetails};
    use crate::ToolFamily;
    use std::path::PathBuf;

    fn install(version: &str, supported: Supported) -> ToolInstall {
        ToolInstall {
            family: ToolFamily::WindowsPhoneSdk,
            version: version.to_string(),
            path: PathBuf::from(version),
            supported,
            selected: false,
            details: InstallDetails::WindowsPhoneSdk(WindowsPhoneSdkDetails {
                registry_key: String::new(),
                deploy_cmd: None,
            }),
        }
    }

    fn selected_versions(installs: &[ToolInstall]) -> Vec<&str> {
        installs
            .iter()
            .filter(|i| i.selected)
            .map(|i| i.version.as_str())
            .collect()
    }

    #[test]
    fn test_highest_version_wins() {
        let mut installs = vec![
            install("8.0", Supported::Yes),
            install("10.0", Supported::Yes),
            install("8.1", Supported::Yes),
        ];
        select(&mut installs, None);
        assert_eq!(selected_versions(&installs), vec!["10.0"]);
    }

    #[test]
    fn test_preferred_version_wins_over_highest() {
        let mut installs = vec![
            install("8.0", Supported::Yes),
            install("8.1", Supported::Yes),
            install("10.0", Supported::Yes),
        ];
        select(&mut installs, Some("8.0"));
        assert_eq!(selected_versions(&installs), vec!["8.0"]);
    }

    #[test]
    fn test_incompatible_preference_falls_back() {
        let mut installs = vec![install("8.0", Supported::Yes), install("7.1", Supported::No)];
        select(&mut installs, Some("7.1"));
        assert_eq!(selected_versions(&installs), vec!["8.0"]);

        select(&mut installs, Some("9.9"));
        assert_eq!(selected_versions(&installs), vec!["8.0"]);
    }

    #[test]
    fn test_maybe_is_eligible() {
        let mut installs = vec![install("12.0", Supported::Yes), install("18.0", Supported::Maybe)];
        select(&mut installs, None);
        assert_eq!(selected_versions(&installs), vec!["18.0"]);
    }

    #[test]
    fn test_nothing_compatible_selects_nothing() {
        let mut installs = vec![install("7.0", Supported::No), install("7.1", Supported::No)];
        assert_eq!(select(&mut installs, None), None);
        assert!(selected_versions(&installs).is_empty());
    }

    #[test]
    fn test_ties_keep_scan_order() {
        let mut installs = vec![install("10.0", Supported::Yes), install("10.0.0", Supported::Yes)];
        assert_eq!(select(&mut installs, None), Some(0));
    }

    #[test]
    fn test_reselect_clears_previous() {
        let mut installs = vec![install("8.0", Supported::Yes), install("8.1", Supported::Yes)];
        installs[0].selected = true;
        select(&mut installs, None);
        assert_eq!(selected_versions(&installs), vec!["8.1"]);
    }

    #[test]
    fn test_empty_input() {
        let mut installs: Vec<ToolInstall> = Vec::new();
        assert_eq!(select(&mut installs, Some("8.0")), None);
    }
}
