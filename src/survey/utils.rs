/// Trim whitespace + strip outer quotes and a leading byte-order mark.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Cleaned cell, or `None` when it is empty.
pub fn non_empty(raw: &str) -> Option<String> {
    let s = clean_str(raw);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parse the export's `Finished` flag. Accepts `True/False`, `true/false` and `1/0`.
pub fn parse_finished(raw: &str) -> Option<bool> {
    match clean_str(raw).to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
