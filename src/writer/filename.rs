//! Timestamped log filename generation (§6.5). Format:
//! `{prefix_}YYYYMMDD_HHMMSS{_partNNN}.{ext}`, UTC, part numbers 001-999.

use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum FilenameError {
    #[error("part number must be between 1 and 999, got {0}")]
    PartOutOfRange(u32),
    #[error("extension cannot be empty after sanitization")]
    EmptyExtension,
}

/// Strip characters unsafe on Windows/macOS/Linux, collapse `_`/`-` runs,
/// trim leading/trailing dots and spaces.
pub fn sanitize_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        return String::new();
    }

    let stripped: String = prefix
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ') && !c.is_control())
        .collect();

    let mut collapsed = String::with_capacity(stripped.len());
    let mut last_sep: Option<char> = None;
    for c in stripped.chars() {
        if c == '_' || c == '-' {
            if last_sep.is_some() {
                continue;
            }
            last_sep = Some(c);
        } else {
            last_sep = None;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches(|c: char| c == ' ' || c == '.').to_string()
}

/// Keep only alphanumerics, preventing path traversal via the extension.
pub fn sanitize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub fn generate_filename(extension: &str, prefix: &str, timestamp: DateTime<Utc>, part_number: Option<u32>) -> Result<String, FilenameError> {
    if let Some(n) = part_number {
        if n < 1 || n > 999 {
            return Err(FilenameError::PartOutOfRange(n));
        }
    }

    let time_str = timestamp.format("%Y%m%d_%H%M%S").to_string();
    let safe_prefix = sanitize_prefix(prefix);

    let mut parts = Vec::new();
    if !safe_prefix.is_empty() {
        parts.push(safe_prefix);
    }
    parts.push(time_str);
    if let Some(n) = part_number {
        parts.push(format!("part{n:03}"));
    }

    let ext = sanitize_extension(extension);
    if ext.is_empty() {
        return Err(FilenameError::EmptyExtension);
    }

    Ok(format!("{}.{}", parts.join("_"), ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 5).unwrap()
    }

    #[test]
    fn basic_filename_without_prefix() {
        let name = generate_filename("csv", "", ts(), None).unwrap();
        assert_eq!(name, "20260115_093005.csv");
    }

    #[test]
    fn prefix_and_part_number_are_included() {
        let name = generate_filename("csv", "rig1", ts(), Some(2)).unwrap();
        assert_eq!(name, "rig1_20260115_093005_part002.csv");
    }

    #[test]
    fn sanitize_prefix_strips_unsafe_characters_and_collapses_runs() {
        assert_eq!(sanitize_prefix("a/b\\c:d*e"), "abcde");
        assert_eq!(sanitize_prefix("a__b--c"), "a_b-c");
        assert_eq!(sanitize_prefix("  .leading.trailing.  "), "leading.trailing");
    }

    #[test]
    fn sanitize_extension_keeps_only_alphanumerics() {
        assert_eq!(sanitize_extension("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_extension(".csv"), "csv");
    }

    #[test]
    fn out_of_range_part_number_is_rejected() {
        assert!(matches!(generate_filename("csv", "", ts(), Some(0)), Err(FilenameError::PartOutOfRange(0))));
        assert!(matches!(generate_filename("csv", "", ts(), Some(1000)), Err(FilenameError::PartOutOfRange(1000))));
    }
}
