//! Environment variable parsing with warn-level logging for invalid values.

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently (expected case).
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) => parse_or_default(var, &v, default),
        Err(_) => default,
    }
}

/// Parse a boolean flag, accepting `1/0`, `yes/no`, `on/off` besides `true/false`.
pub fn env_flag(var: &str, default: bool) -> bool {
    let Ok(raw) = std::env::var(var) else {
        return default;
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(var, value = %raw, default, "invalid boolean env var, using default");
            default
        },
    }
}

fn parse_or_default<T: std::str::FromStr + std::fmt::Display>(var: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(n) => n,
        Err(_) => {
            tracing::warn!(
                var,
                value = %raw,
                default = %default,
                "invalid env var value, using default"
            );
            default
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_value() {
        let result: u32 = parse_or_default("SMART_QUERY_TEST", "42", 10);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let result: usize = parse_or_default("SMART_QUERY_TEST", " 7 ", 10);
        assert_eq!(result, 7);
    }

    #[test]
    fn test_parse_invalid_value() {
        let result: u32 = parse_or_default("SMART_QUERY_TEST", "banana", 10);
        assert_eq!(result, 10);
    }

    #[test]
    fn test_parse_empty_value() {
        let result: f32 = parse_or_default("SMART_QUERY_TEST", "", 0.5);
        assert!((result - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_var_returns_default() {
        let result: u32 = env_parse_with_default("SMART_QUERY_TEST_MISSING_18273", 10);
        assert_eq!(result, 10);
        assert!(env_flag("SMART_QUERY_TEST_MISSING_18274", true));
    }
}
