//! Truncation Utilities
//!
//! Keeps long captions readable in log lines without splitting UTF-8
//! characters.

/// Shorten `content` to roughly `max_bytes`, keeping the head and the tail.
pub fn truncate_middle(content: &str, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content.to_string();
    }

    if max_bytes == 0 {
        return format!("... [{} chars truncated] ...", content.len());
    }

    let half = max_bytes / 2;
    let mut prefix_end = 0;
    let mut suffix_start = content.len();

    for (idx, c) in content.char_indices() {
        let char_end = idx + c.len_utf8();
        if char_end <= half {
            prefix_end = char_end;
        } else {
            break;
        }
    }

    let suffix_target = content.len().saturating_sub(half);
    for (idx, _) in content.char_indices().rev() {
        if idx >= suffix_target {
            suffix_start = idx;
        } else {
            break;
        }
    }

    if suffix_start < prefix_end {
        suffix_start = prefix_end;
    }

    let prefix = &content[..prefix_end];
    let suffix = &content[suffix_start..];
    let truncated_count = content.len() - (prefix.len() + suffix.len());

    format!("{} ... [{} chars truncated] ... {}", prefix, truncated_count, suffix)
}

/// Single-line preview of at most `max_chars` characters, for log output.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }

    let keep = max_chars.saturating_sub(3);
    let mut out: String = flat.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_middle_short_text_untouched() {
        assert_eq!(truncate_middle("short", 10), "short");
    }

    #[test]
    fn test_truncate_middle_keeps_head_and_tail() {
        let out = truncate_middle("abcdefghijklmnopqrstuvwxyz", 10);
        assert!(out.starts_with("abcde"));
        assert!(out.ends_with("vwxyz"));
        assert!(out.contains("[16 chars truncated]"));
    }

    #[test]
    fn test_truncate_middle_respects_char_boundaries() {
        let text = "━━━━━━━━━━━━━━━━━━━━";
        let out = truncate_middle(text, 7);
        assert!(out.starts_with("━ ..."));
    }

    #[test]
    fn test_truncate_for_log_flattens_lines() {
        assert_eq!(truncate_for_log("Dune\n━━━\nLanguage: EN", 80), "Dune ━━━ Language: EN");
    }

    #[test]
    fn test_truncate_for_log_limits_chars() {
        assert_eq!(truncate_for_log("🎬🎬🎬🎬🎬🎬", 5), "🎬🎬...");
    }
}
