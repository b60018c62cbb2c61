//! Track-to-package identity resolution

use indexmap::IndexMap;

/// Resolve the installed-package identifier a track should be compared
/// against.
///
/// A non-blank entry in the track mapping always wins. A wholly empty
/// mapping falls back to the repository's global package identifier. Once
/// any track has been mapped, unmapped tracks resolve to `None` instead of
/// the global identifier, so a disambiguated track is never conflated with
/// the default again.
pub fn resolve_package_id(
    mapping: &IndexMap<String, String>,
    global_package_id: &str,
    track_name: &str,
) -> Option<String> {
    if let Some(mapped) = mapping.get(track_name) {
        let mapped = mapped.trim();
        if !mapped.is_empty() {
            return Some(mapped.to_string());
        }
    }

    if mapping.is_empty() {
        let global = global_package_id.trim();
        if !global.is_empty() {
            return Some(global.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mapping(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    // Empty mapping: every track falls back to the global identifier.
    #[case(&[], "com.x", "Release", Some("com.x"))]
    #[case(&[], "com.x", "Pre-Release", Some("com.x"))]
    // Mapped track wins over the global identifier.
    #[case(&[("Release", "com.y")], "com.x", "Release", Some("com.y"))]
    // Non-empty mapping without this track: unresolved, not the global id.
    #[case(&[("Release", "com.y")], "com.x", "Pre-Release", None)]
    // Blank mapped entry does not resolve.
    #[case(&[("Release", "  ")], "com.x", "Release", None)]
    // Empty mapping with blank global: unresolved.
    #[case(&[], "  ", "Release", None)]
    fn resolve_package_id_applies_asymmetric_fallback(
        #[case] entries: &[(&str, &str)],
        #[case] global: &str,
        #[case] track: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(
            resolve_package_id(&mapping(entries), global, track),
            expected.map(|s| s.to_string())
        );
    }

    #[test]
    fn mapped_identifier_is_trimmed() {
        let m = mapping(&[("Release", " com.y ")]);
        assert_eq!(
            resolve_package_id(&m, "", "Release"),
            Some("com.y".to_string())
        );
    }
}
