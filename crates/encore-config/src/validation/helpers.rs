//! Shared range-validation helpers used by all section validators.

/// Push an error if `value` is outside `[min, max]` (integer).
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error if `value` is outside `[min, max]` (milliseconds and other u64s).
pub(crate) fn validate_range_u64(
    errors: &mut Vec<String>,
    name: &str,
    value: u64,
    min: u64,
    max: u64,
) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error unless `value` starts with one of `schemes`.
/// Empty values are allowed when `allow_empty` is set.
pub(crate) fn validate_url(
    errors: &mut Vec<String>,
    name: &str,
    value: &str,
    schemes: &[&str],
    allow_empty: bool,
) {
    if value.is_empty() {
        if !allow_empty {
            errors.push(format!("{name} must not be empty"));
        }
        return;
    }
    if !schemes.iter().any(|s| value.starts_with(&format!("{s}://"))) {
        errors.push(format!(
            "{name} = {value:?} must use one of: {}",
            schemes.join(", ")
        ));
    }
}
