//! SDK manifest parsing (`SDKManifest.xml`, `Platform.xml`).

use crate::{DetectError, Result};
use roxmltree::{Document, Node};
use std::path::Path;

/// Defaults declared by the `FileList` element of `SDKManifest.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SdkManifest {
    pub display_name: Option<String>,
    pub min_vs_version: Option<String>,
}

/// Contents of a `Platforms\UAP\<version>\Platform.xml` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlatformManifest {
    /// `version` attribute of `ApplicationPlatform`.
    pub version: Option<String>,
    pub friendly_name: Option<String>,
    /// Text of the `MinimumVisualStudioVersion` element.
    pub min_vs_version: Option<String>,
}

fn parse<'a>(xml: &'a str, path: &Path) -> Result<Document<'a>> {
    Document::parse(xml).map_err(|e| DetectError::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Finds the first element with the given local name, ignoring namespaces.
fn find_element<'a, 'input>(doc: &'a Document<'input>, name: &str) -> Option<Node<'a, 'input>> {
    doc.descendants()
        .find(|node| node.is_element() && node.tag_name().name() == name)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

pub(crate) fn parse_sdk_manifest(xml: &str, path: &Path) -> Result<SdkManifest> {
    let doc = parse(xml, path)?;
    let Some(file_list) = find_element(&doc, "FileList") else {
        return Ok(SdkManifest::default());
    };
    Ok(SdkManifest {
        display_name: non_empty(file_list.attribute("DisplayName")),
        min_vs_version: non_empty(file_list.attribute("MinVSVersion")),
    })
}

/// Parses `Platform.xml`. A document without an `ApplicationPlatform`
/// element is rejected.
pub(crate) fn parse_platform(xml: &str, path: &Path) -> Result<PlatformManifest> {
    let doc = parse(xml, path)?;
    let platform = find_element(&doc, "ApplicationPlatform").ok_or_else(|| DetectError::Manifest {
        path: path.to_path_buf(),
        message: "missing ApplicationPlatform element".to_string(),
    })?;

    let min_vs_version = platform
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == "MinimumVisualStudioVersion")
        .and_then(|node| non_empty(node.text()));

    Ok(PlatformManifest {
        version: non_empty(platform.attribute("version")),
        friendly_name: non_empty(platform.attribute("friendlyName")),
        min_vs_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDK_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FileList
  DisplayName="Windows 10 SDK"
  PlatformIdentity="UAP, Version=10.0.17763.0"
  MinVSVersion="15.0.25909.02">
</FileList>"#;

    const PLATFORM_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ApplicationPlatform
  name="UAP"
  friendlyName="Windows 10 (10.0.17763.0)"
  version="10.0.17763.0"
  xmlns="http://schemas.microsoft.com/developer/appx/2015/build">
  <MinimumVisualStudioVersion>15.0.25909.02</MinimumVisualStudioVersion>
  <ContainedApiContracts />
</ApplicationPlatform>"#;

    #[test]
    fn test_parse_sdk_manifest() {
        let manifest = parse_sdk_manifest(SDK_MANIFEST, Path::new("SDKManifest.xml")).unwrap();
        assert_eq!(manifest.display_name.as_deref(), Some("Windows 10 SDK"));
        assert_eq!(manifest.min_vs_version.as_deref(), Some("15.0.25909.02"));
    }

    #[test]
    fn test_sdk_manifest_without_file_list() {
        let manifest = parse_sdk_manifest("<Other/>", Path::new("SDKManifest.xml")).unwrap();
        assert_eq!(manifest, SdkManifest::default());
    }

    #[test]
    fn test_parse_platform_with_namespace() {
        let platform = parse_platform(PLATFORM_XML, Path::new("Platform.xml")).unwrap();
        assert_eq!(platform.version.as_deref(), Some("10.0.17763.0"));
        assert_eq!(
            platform.friendly_name.as_deref(),
            Some("Windows 10 (10.0.17763.0)")
        );
        assert_eq!(platform.min_vs_version.as_deref(), Some("15.0.25909.02"));
    }

    #[test]
    fn test_malformed_xml() {
        let error = parse_platform("<ApplicationPlatform", Path::new("Platform.xml")).unwrap_err();
        assert!(matches!(error, DetectError::Manifest { .. }));
    }

    #[test]
    fn test_platform_requires_root_element() {
        assert!(parse_platform("<Nope/>", Path::new("Platform.xml")).is_err());
    }
}
