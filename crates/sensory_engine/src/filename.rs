use chrono::{DateTime, Utc};

/// Filesystem-safe artifact name: `{prefix}[_{label}]_{YYYYmmdd_HHMMSS}.{ext}`.
pub fn artifact_filename(
    prefix: &str,
    label: Option<&str>,
    at: DateTime<Utc>,
    extension: &str,
) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S");
    match label.map(sanitize_label).filter(|label| !label.is_empty()) {
        Some(label) => format!("{prefix}_{label}_{stamp}.{extension}"),
        None => format!("{prefix}_{stamp}.{extension}"),
    }
}

fn sanitize_label(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let trimmed = compacted.trim_matches(&['_', ' ', '.'][..]);
    trimmed.chars().take(64).collect()
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '\0'..='\u{1F}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn name_without_label_uses_prefix_and_stamp() {
        assert_eq!(
            artifact_filename("screenshot", None, at(), "png"),
            "screenshot_20240309_140507.png"
        );
    }

    #[test]
    fn host_label_is_sanitized() {
        assert_eq!(
            artifact_filename("page_analysis", Some("example.com:8080"), at(), "txt"),
            "page_analysis_example.com_8080_20240309_140507.txt"
        );
    }

    #[test]
    fn label_of_only_forbidden_chars_is_dropped() {
        assert_eq!(
            artifact_filename("page_analysis", Some("://"), at(), "txt"),
            "page_analysis_20240309_140507.txt"
        );
    }
}
