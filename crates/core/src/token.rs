//! Token estimation.
//!
//! Uses a character-based heuristic: ~4 bytes of UTF-8 per token, rounded
//! up. Every budget computation in the workspace goes through
//! [`estimate_tokens`], so the arithmetic is reproducible across stores
//! and assembly runs.

/// Estimate the token count for a string: `ceil(len / 4)`.
///
/// Pure, O(1), and monotonic in the byte length of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Sum of [`estimate_tokens`] over a sequence of texts.
pub fn estimate_all<'a>(texts: impl IntoIterator<Item = &'a str>) -> usize {
    texts.into_iter().map(estimate_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn monotonic_in_length() {
        let mut last = 0;
        for n in 0..64 {
            let est = estimate_tokens(&"x".repeat(n));
            assert!(est >= last);
            last = est;
        }
    }

    #[test]
    fn sums_over_texts() {
        assert_eq!(estimate_all(["hello", "test", ""]), 3);
    }
}
