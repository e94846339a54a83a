use std::sync::LazyLock;

use regex::Regex;

/// Loose version shape: digits followed by one or more `.alnum` groups.
/// Pulls `1.2.3` out of `"= 1.2.3"`, `"> 1.2.3"` or `"1.2.3:deadbeef"`.
pub static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(\.[0-9a-zA-Z]+)+").unwrap());

/// Extract the first version-like substring, or `""` when there is none.
pub fn extract_version(text: &str) -> &str {
    VERSION_RE.find(text).map_or("", |m| m.as_str())
}

/// Compare two loosely formatted version strings.
///
/// Only the first three dot-separated components are compared, as integers.
/// A component of `a` that is missing or not numeric makes `a` the lesser
/// operand; the same on the `b` side makes `a` not less. `a` is checked
/// first at every position, so the policy is not symmetric.
pub fn version_less(a: &str, b: &str) -> bool {
    let mut a_parts = extract_version(a).split('.');
    let mut b_parts = extract_version(b).split('.');

    for _ in 0..3 {
        let a_val = match a_parts.next().and_then(|p| p.parse::<i64>().ok()) {
            Some(v) => v,
            None => return true,
        };
        let b_val = match b_parts.next().and_then(|p| p.parse::<i64>().ok()) {
            Some(v) => v,
            None => return false,
        };

        if a_val != b_val {
            return a_val < b_val;
        }
    }

    false
}
