//! JSON utility functions shared across crates.

/// Strip markdown code block wrappers from JSON content.
///
/// Handles `` ```json ... ``` ``, `` ``` ... ``` ``, and other language identifiers.
#[must_use]
pub fn strip_markdown_json(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6 {
        let without_prefix = trimmed.strip_prefix("```").unwrap_or(trimmed);
        let without_suffix = without_prefix.strip_suffix("```").unwrap_or(without_prefix);
        return without_suffix
            .split_once('\n')
            .map_or_else(|| without_suffix.trim(), |(_, rest)| rest.trim());
    }
    trimmed
}

/// Locate the outermost JSON object or array inside free text.
///
/// Models sometimes wrap the payload in prose ("Here is the JSON: {...}").
/// Returns the slice from the first opening bracket to the matching last
/// closing bracket of the same kind, or `None` when no candidate exists.
#[must_use]
pub fn extract_json_payload(content: &str) -> Option<&str> {
    let stripped = strip_markdown_json(content);
    let start = stripped.find(['{', '['])?;
    let close = if stripped[start..].starts_with('{') { '}' } else { ']' };
    let end = stripped.rfind(close)?;
    if end <= start {
        return None;
    }
    stripped.get(start..=end)
}
