/// Helpers for Telegram's MarkdownV2 parse mode.
///
/// Every character with special meaning in MarkdownV2 must be escaped
/// with a backslash to be shown literally.
const SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Escapes markdown special characters for MarkdownV2 parsing mode
///
/// # Example
/// ```
/// use workout_deposit_bot::utils::markdown::escape_markdown;
///
/// let escaped = escape_markdown("Deposit: 5000 (30 days)!");
/// assert_eq!(escaped, "Deposit: 5000 \\(30 days\\)\\!");
/// ```
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_basic_markdown() {
        assert_eq!(escape_markdown("Hello *world*"), "Hello \\*world\\*");
        assert_eq!(escape_markdown("_italic_"), "\\_italic\\_");
    }

    #[test]
    fn test_escape_schedule_line() {
        assert_eq!(escape_markdown("Mon 19:30 · 60 min"), "Mon 19:30 · 60 min");
        assert_eq!(escape_markdown("3/3 photos (2 verified)."), "3/3 photos \\(2 verified\\)\\.");
    }

    #[test]
    fn test_escape_backslash() {
        assert_eq!(escape_markdown("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_escape_empty_and_plain_text() {
        assert_eq!(escape_markdown(""), "");
        assert_eq!(escape_markdown("plain text"), "plain text");
    }
}
