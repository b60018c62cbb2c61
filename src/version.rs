//! Version string comparison
//!
//! Release tags and installed version names rarely follow strict semver
//! ("1.0.1(23)", "1.0.0-beta", "2.1"), so this module implements a lenient
//! total ordering instead of parsing with a semver library. Numeric
//! components decide the order; a case-insensitive lexical comparison
//! breaks ties so suffixed versions still order deterministically.

use std::cmp::Ordering;

/// Strip surrounding whitespace and a single leading 'v'/'V'.
fn normalize(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed)
}

/// Parse the leading digit run of a component ("10-rc1" -> 10, "beta" -> 0).
fn numeric_component(component: &str) -> i64 {
    let end = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    component[..end].parse().unwrap_or(0)
}

/// Compare two version strings.
///
/// Rules, applied in order:
/// 1. identical after normalization -> `Equal`
/// 2. empty vs non-empty -> empty is `Less`
/// 3. component-wise numeric comparison of '.'-separated parts, with
///    missing trailing components treated as 0
/// 4. all numeric components equal -> case-insensitive lexical comparison
///    of the normalized strings (e.g. "1.0.0" vs "1.0.0-beta")
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return Ordering::Equal;
    }
    if a.is_empty() {
        return Ordering::Less;
    }
    if b.is_empty() {
        return Ordering::Greater;
    }

    let parts_a: Vec<i64> = a.split('.').map(numeric_component).collect();
    let parts_b: Vec<i64> = b.split('.').map(numeric_component).collect();

    let len = parts_a.len().max(parts_b.len());
    for i in 0..len {
        let pa = parts_a.get(i).copied().unwrap_or(0);
        let pb = parts_b.get(i).copied().unwrap_or(0);
        match pa.cmp(&pb) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
    }

    a.to_lowercase().cmp(&b.to_lowercase())
}
