//! Chooses the value an operation acts on.

use super::Operation;

/// Picks the current value from the configured value, the default, and the
/// value already in the file.
///
/// For `=` the configured value wins unless a default is also given and the
/// key is new, in which case the default seeds it. A lone default never
/// overwrites an existing value. For `+`/`-` the configured value is the
/// operand, so the base is the old value or else the default.
pub fn resolve(
    operation: Operation,
    explicit: Option<&str>,
    default: Option<&str>,
    old: Option<&str>,
) -> Option<String> {
    let picked = match operation {
        Operation::Assign => match (explicit, default, old) {
            (Some(value), None, _) => Some(value),
            (None, Some(_), Some(old)) => Some(old),
            (None, Some(default), None) => Some(default),
            (Some(value), Some(_), Some(_)) => Some(value),
            (Some(_), Some(default), None) => Some(default),
            (None, None, _) => None,
        },
        _ => old.or(default),
    };
    picked.map(str::to_string)
}
