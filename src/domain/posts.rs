//! Display helpers for posts and comments.

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

/// Length of the short text representation of posts and comments.
pub const SHORT_TEXT_LEN: usize = 15;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");

/// First `limit` characters of `text`, counted in Unicode scalar values.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Short representation used in admin-like listings and logs.
pub fn short_text(text: &str) -> &str {
    truncate_chars(text, SHORT_TEXT_LEN)
}

pub fn format_human_date(value: OffsetDateTime) -> String {
    value
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("Привет, мир", 6), "Привет");
        assert_eq!(truncate_chars("short", 30), "short");
    }

    #[test]
    fn short_text_is_fifteen_characters() {
        assert_eq!(short_text("Тестовый пост для проверки"), "Тестовый пост д");
    }

    #[test]
    fn human_date_uses_long_month() {
        assert_eq!(
            format_human_date(datetime!(2024-03-07 10:00 UTC)),
            "7 March 2024"
        );
    }
}
