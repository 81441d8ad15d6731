//! Truncation Utilities
//!
//! Keeps diagnostic excerpts of oracle responses short while respecting
//! UTF-8 boundaries. Whitespace runs are collapsed so excerpts stay on one line.

/// Collapse whitespace and cut to at most `max_chars` characters.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let total = collapsed.chars().count();

    if total <= max_chars {
        return collapsed;
    }

    if max_chars == 0 {
        return format!("... [{} chars truncated]", total);
    }

    let cut: String = collapsed.chars().take(max_chars).collect();
    format!("{} ... [{} chars truncated]", cut.trim_end(), total - max_chars)
}
