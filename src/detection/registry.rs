//! Read-only registry access through `reg query`.

use crate::runner::CommandRunner;
use crate::Result;
use regex::Regex;
use std::ffi::OsStr;
use std::sync::OnceLock;
use std::time::Duration;

/// A value line of `reg query <key> /v *` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegValue {
    pub name: String,
    pub kind: String,
    pub data: String,
}

/// Splits on runs of three or more spaces.
fn column_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {3,}").expect("Invalid column regex"))
}

/// Parses the value lines of `reg query` output. Key header lines and
/// blank lines are skipped.
pub(crate) fn parse_values(output: &str) -> Vec<RegValue> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = column_separator()
                .split(line.trim())
                .map(str::trim)
                .collect();
            match parts.as_slice() {
                [name, kind, data] if kind.starts_with("REG_") => Some(RegValue {
                    name: name.to_string(),
                    kind: kind.to_string(),
                    data: data.to_string(),
                }),
                // Empty REG_SZ values have no data column.
                [name, kind] if kind.starts_with("REG_") => Some(RegValue {
                    name: name.to_string(),
                    kind: kind.to_string(),
                    data: String::new(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// Parses the subkey lines of `reg query <key>` output.
pub(crate) fn parse_subkeys(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("HK") && !column_separator().is_match(line))
        .map(String::from)
        .collect()
}

/// Returns the full paths of the subkeys of `key`. A failing query yields
/// no subkeys.
pub(crate) async fn list_subkeys(
    runner: &dyn CommandRunner,
    key: &str,
    limit: Duration,
) -> Result<Vec<String>> {
    let args = vec!["query".to_string(), key.to_string()];
    let output = runner.run(OsStr::new("reg"), &args, limit).await?;
    if !output.success() {
        tracing::debug!(key, code = ?output.code, "registry key not readable");
        return Ok(Vec::new());
    }
    let queried = normalize_root(key);
    Ok(parse_subkeys(&output.stdout)
        .into_iter()
        .filter(|subkey| normalize_root(subkey) != queried)
        .collect())
}

/// Returns the values of `key`, or `None` if the key cannot be read.
pub(crate) async fn query_values(
    runner: &dyn CommandRunner,
    key: &str,
    limit: Duration,
) -> Result<Option<Vec<RegValue>>> {
    let args = vec![
        "query".to_string(),
        key.to_string(),
        "/v".to_string(),
        "*".to_string(),
    ];
    let output = runner.run(OsStr::new("reg"), &args, limit).await?;
    if !output.success() {
        tracing::debug!(key, code = ?output.code, "registry values not readable");
        return Ok(None);
    }
    Ok(Some(parse_values(&output.stdout)))
}

/// Reads a single named value of `key`.
pub(crate) async fn get_value(
    runner: &dyn CommandRunner,
    key: &str,
    name: &str,
    limit: Duration,
) -> Result<Option<String>> {
    Ok(query_values(runner, key, limit)
        .await?
        .and_then(|values| values.into_iter().find(|v| v.name.eq_ignore_ascii_case(name)))
        .map(|v| v.data))
}

/// `reg` prints full root names; callers may use the short forms.
fn normalize_root(key: &str) -> String {
    let upper = key.to_ascii_uppercase();
    for (short, long) in [
        ("HKLM\\", "HKEY_LOCAL_MACHINE\\"),
        ("HKCU\\", "HKEY_CURRENT_USER\\"),
        ("HKCR\\", "HKEY_CLASSES_ROOT\\"),
        ("HKU\\", "HKEY_USERS\\"),
    ] {
        if let Some(rest) = upper.strip_prefix(short) {
            return format!("{long}{rest}");
        }
    }
    upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::ScriptedRunner;

    const SUBKEYS: &str = "\r\n\
        HKEY_LOCAL_MACHINE\\Software\\Wow6432Node\\Microsoft\\VisualStudio\r\n    \
        InstallDir    REG_SZ    C:\\x\r\n\r\n\
        HKEY_LOCAL_MACHINE\\Software\\Wow6432Node\\Microsoft\\VisualStudio\\11.0\r\n\
        HKEY_LOCAL_MACHINE\\Software\\Wow6432Node\\Microsoft\\VisualStudio\\12.0_Config\r\n";

    const VALUES: &str = "\r\n\
        HKEY_CURRENT_USER\\Software\\Microsoft\\VisualStudio\\12.0_Config\r\n    \
        CLR Version    REG_SZ    v4.0.30319\r\n    \
        ShellFolder    REG_SZ    C:\\Program Files (x86)\\Microsoft Visual Studio 12.0\\\r\n    \
        Empty    REG_SZ\r\n    \
        Flags    REG_DWORD    0x1\r\n";

    #[test]
    fn test_parse_values() {
        let values = parse_values(VALUES);
        assert_eq!(values.len(), 4);
        assert_eq!(values[0].name, "CLR Version");
        assert_eq!(values[0].data, "v4.0.30319");
        assert_eq!(
            values[1].data,
            "C:\\Program Files (x86)\\Microsoft Visual Studio 12.0\\"
        );
        assert_eq!(values[2].data, "");
        assert_eq!(values[3].kind, "REG_DWORD");
    }

    #[test]
    fn test_parse_subkeys_skips_values() {
        let subkeys = parse_subkeys(SUBKEYS);
        assert_eq!(subkeys.len(), 3);
        assert!(subkeys[2].ends_with("12.0_Config"));
    }

    #[tokio::test]
    async fn test_list_subkeys_excludes_queried_key() {
        let runner = ScriptedRunner::new().on(
            "reg",
            &["query", "HKLM\\Software\\Wow6432Node\\Microsoft\\VisualStudio"],
            SUBKEYS,
        );
        let subkeys = list_subkeys(
            &runner,
            "HKLM\\Software\\Wow6432Node\\Microsoft\\VisualStudio",
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(subkeys.len(), 2);
        assert!(subkeys[0].ends_with("\\11.0"));
    }

    #[tokio::test]
    async fn test_failed_query_yields_nothing() {
        let runner = ScriptedRunner::new();
        let subkeys = list_subkeys(&runner, "HKLM\\Nope", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(subkeys.is_empty());

        let values = query_values(&runner, "HKLM\\Nope", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(values.is_none());
    }

    #[tokio::test]
    async fn test_get_value_is_case_insensitive() {
        let runner = ScriptedRunner::new().on(
            "reg",
            &["query", "HKCU\\VS\\12.0_Config", "/v", "*"],
            VALUES,
        );
        let limit = Duration::from_secs(1);
        let folder = get_value(&runner, "HKCU\\VS\\12.0_Config", "shellfolder", limit)
            .await
            .unwrap();
        assert!(folder.unwrap().ends_with("Visual Studio 12.0\\"));
    }
}
