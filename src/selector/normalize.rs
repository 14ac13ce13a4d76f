//! Text normalization shared by messages and tool search text

use std::sync::LazyLock;

use regex::Regex;

static COMBINING_MARKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{M}").expect("valid regex"));

static PUNCT_OR_SYMBOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{P}\p{S}]").expect("valid regex"));

/// Lowercase, drop combining marks, turn punctuation and symbols into
/// spaces, collapse whitespace, trim.
///
/// Arabic tashkeel are combining marks, so "جَزِيرَة" and "جزيرة" normalize
/// to the same string.
pub fn normalize_text(input: &str) -> String {
    let lower = input.to_lowercase();
    let unmarked = COMBINING_MARKS.replace_all(&lower, "");
    let spaced = PUNCT_OR_SYMBOL.replace_all(&unmarked, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize and split on whitespace
pub fn tokenize(input: &str) -> Vec<String> {
    normalize_text(input)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_trim() {
        assert_eq!(normalize_text("  Total SALES  "), "total sales");
    }

    #[test]
    fn test_punctuation_becomes_space() {
        assert_eq!(normalize_text("sales,value;in-Yas?"), "sales value in yas");
        assert_eq!(normalize_text("get_sales_value"), "get sales value");
    }

    #[test]
    fn test_symbols_become_space() {
        assert_eq!(normalize_text("120,000 AED + $5"), "120 000 aed 5");
    }

    #[test]
    fn test_arabic_question_mark_and_diacritics() {
        assert_eq!(normalize_text("كم عدد المعاملات؟"), "كم عدد المعاملات");
        assert_eq!(normalize_text("جَزِيرَة"), "جزيرة");
    }

    #[test]
    fn test_latin_combining_marks() {
        // "e" followed by U+0301 COMBINING ACUTE ACCENT
        assert_eq!(normalize_text("cafe\u{0301}"), "cafe");
    }

    #[test]
    fn test_arabic_indic_digits_kept() {
        assert_eq!(normalize_text("المبيعات في ٢٠٢٣"), "المبيعات في ٢٠٢٣");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \t\n "), "");
        assert_eq!(normalize_text("?!..."), "");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Sales in Yas, 2024!"), vec!["sales", "in", "yas", "2024"]);
        assert!(tokenize("  ").is_empty());
    }
}
