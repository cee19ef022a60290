//! Whitespace/punctuation segmentation with per-script token-length rules
//! (spec §4.6 "Heuristic estimator").

/// Estimates the token count of `text` without calling out to any model.
/// Linear in `text.len()`, O(1) memory beyond the input.
pub fn estimate_tokens(text: &str) -> usize {
    let mut total = 0usize;
    for word in segment(text) {
        total += estimate_word(word);
    }
    total
}

/// Splits on whitespace and punctuation boundaries, keeping CJK characters
/// as their own one-character segments (they carry no word-break signal).
fn segment(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = None;
    let mut last_end = 0;

    for (idx, ch) in text.char_indices() {
        let ch_len = ch.len_utf8();
        if is_cjk(ch) {
            if let Some(s) = start.take() {
                segments.push(&text[s..idx]);
            }
            segments.push(&text[idx..idx + ch_len]);
            last_end = idx + ch_len;
            continue;
        }
        if ch.is_whitespace() || ch.is_ascii_punctuation() {
            if let Some(s) = start.take() {
                segments.push(&text[s..idx]);
            }
            last_end = idx + ch_len;
            continue;
        }
        if start.is_none() {
            start = Some(idx);
        }
        last_end = idx + ch_len;
    }
    if let Some(s) = start {
        segments.push(&text[s..last_end]);
    }
    segments.into_iter().filter(|s| !s.is_empty()).collect()
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0xAC00..=0xD7A3
    )
}

fn estimate_word(word: &str) -> usize {
    let char_count = word.chars().count();
    if char_count == 0 {
        return 0;
    }
    if char_count == 1 && is_cjk(word.chars().next().unwrap()) {
        return 1;
    }
    if word.chars().all(|c| c.is_ascii_digit()) {
        return 1;
    }
    if char_count <= 3 {
        return 1;
    }
    let k = script_divisor(word);
    (char_count as f64 / k).ceil() as usize
}

/// Latin-alphabet token-length divisor by detected script family: European
/// inflected languages compress less tightly than English; anything outside
/// the Latin block falls back to the most conservative divisor.
fn script_divisor(word: &str) -> f64 {
    let has_diacritic = word
        .chars()
        .any(|c| !c.is_ascii() && c.is_alphabetic());
    let all_ascii_alpha = word.chars().all(|c| c.is_ascii_alphabetic());
    if all_ascii_alpha {
        4.0
    } else if has_diacritic {
        3.25
    } else {
        6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ascii_word_costs_one_token() {
        assert_eq!(estimate_tokens("cat"), 1);
    }

    #[test]
    fn longer_english_word_uses_k_four() {
        // "elephant" = 8 chars -> ceil(8/4.0) = 2
        assert_eq!(estimate_tokens("elephant"), 2);
    }

    #[test]
    fn digit_run_is_one_token_regardless_of_length() {
        assert_eq!(estimate_tokens("1234567890"), 1);
    }

    #[test]
    fn each_cjk_character_is_its_own_token() {
        let tokens = estimate_tokens("你好世界");
        assert_eq!(tokens, 4);
    }

    #[test]
    fn whitespace_and_punctuation_split_words() {
        // "a,b c" -> ["a","b","c"] each short -> 3 tokens
        assert_eq!(estimate_tokens("a,b c"), 3);
    }

    #[test]
    fn empty_string_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }
}
