//! Weighted character counting for publish targets
//!
//! The publishing API wraps every link through its shortener, so a URL
//! costs a fixed 23 characters regardless of its length. Counting is
//! advisory: an over-limit draft still goes through review, but surfaces a
//! warning so the reviewer can push back.

use std::sync::OnceLock;

use regex::Regex;

/// Hard limit enforced by the publish target.
pub const CHAR_LIMIT: usize = 280;

/// Fixed cost of any URL after link wrapping.
pub const URL_WEIGHT: usize = 23;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"https?://[^\s]+").unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

/// Character count as the publish target will see it: every URL counts as
/// `URL_WEIGHT`, everything else by Unicode scalar values.
pub fn weighted_len(text: &str) -> usize {
    let mut len = 0;
    let mut last_end = 0;

    for m in url_pattern().find_iter(text) {
        len += text[last_end..m.start()].chars().count();
        len += URL_WEIGHT;
        last_end = m.end();
    }
    len += text[last_end..].chars().count();

    len
}

/// Returns the overage when the text exceeds the limit, `None` otherwise.
pub fn over_limit(text: &str) -> Option<usize> {
    let len = weighted_len(text);
    (len > CHAR_LIMIT).then(|| len - CHAR_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_counts_chars() {
        assert_eq!(weighted_len("hello world"), 11);
        assert_eq!(weighted_len(""), 0);
    }

    #[test]
    fn test_unicode_counts_scalars_not_bytes() {
        // Multi-byte characters count one each
        assert_eq!(weighted_len("こんにちは"), 5);
    }

    #[test]
    fn test_url_counts_fixed_weight() {
        let text = "see https://example.com/a/very/long/path/that/keeps/going/and/going";
        assert_eq!(weighted_len(text), 4 + URL_WEIGHT);
    }

    #[test]
    fn test_short_url_also_fixed_weight() {
        assert_eq!(weighted_len("http://a.io"), URL_WEIGHT);
    }

    #[test]
    fn test_multiple_urls() {
        let text = "a https://one.example b http://two.example c";
        assert_eq!(weighted_len(text), 2 + URL_WEIGHT + 3 + URL_WEIGHT + 2);
    }

    #[test]
    fn test_over_limit_boundary() {
        let exactly = "x".repeat(CHAR_LIMIT);
        assert_eq!(over_limit(&exactly), None);

        let one_over = "x".repeat(CHAR_LIMIT + 1);
        assert_eq!(over_limit(&one_over), Some(1));
    }

    #[test]
    fn test_long_url_can_keep_text_under_limit() {
        // 250 plain chars plus a 200-char URL still fits: 250 + 1 + 23
        let url = format!("https://example.com/{}", "p".repeat(180));
        let text = format!("{} {}", "x".repeat(250), url);
        assert_eq!(over_limit(&text), None);
    }
}
