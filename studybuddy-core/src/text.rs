//! Small text utilities shared by the extraction strategies.

use crate::types::NOT_AVAILABLE;

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max` characters (not bytes).
pub fn clamp_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Character count (not bytes).
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Collapse whitespace, optionally clamp, and substitute `"N/A"` for empty values.
pub fn clean_field(value: &str, limit: Option<usize>) -> String {
    let collapsed = collapse_whitespace(value);
    let bounded = match limit {
        Some(max) => clamp_chars(&collapsed, max).trim_end().to_string(),
        None => collapsed,
    };
    if bounded.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        bounded
    }
}

/// Split text into sentences.
///
/// A boundary is `.`, `!` or `?` followed by whitespace or the end of the
/// text. Sentences are whitespace-collapsed; empty ones are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = match chars.peek() {
                None => true,
                Some(next) => next.is_whitespace(),
            };
            if at_boundary {
                let sentence = collapse_whitespace(&current);
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }

    let tail = collapse_whitespace(&current);
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Return the first balanced `{...}` substring.
///
/// Braces inside JSON string literals are ignored. Returns `None` when no
/// opening brace exists or the first object never closes.
pub fn first_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&s[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Lowercase, split on non-alphanumerics, and keep tokens longer than three characters.
pub fn content_tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// Distinct tokens in first-seen order.
pub fn distinct_tokens(s: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in content_tokens(s) {
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_clamp_chars_is_char_safe() {
        assert_eq!(clamp_chars("héllo", 2), "hé");
        assert_eq!(clamp_chars("abc", 10), "abc");
        assert_eq!(clamp_chars("abc", 0), "");
    }

    #[test]
    fn test_clean_field() {
        assert_eq!(clean_field("  ", None), NOT_AVAILABLE);
        assert_eq!(clean_field("a   b", None), "a b");
        assert_eq!(clean_field("abcdef", Some(3)), "abc");
        assert_eq!(clean_field("ab cdef", Some(3)), "ab");
    }

    #[test]
    fn test_split_sentences_boundaries() {
        let s = split_sentences("First one. Second!  Third? v1.2 is a version. Tail");
        assert_eq!(
            s,
            vec!["First one.", "Second!", "Third?", "v1.2 is a version.", "Tail"]
        );
    }

    #[test]
    fn test_split_sentences_keeps_decimal_numbers() {
        let s = split_sentences("Accuracy reached 92.5% on the test set.");
        assert_eq!(s, vec!["Accuracy reached 92.5% on the test set."]);
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n ").is_empty());
    }

    #[test]
    fn test_first_json_object() {
        let out = "Sure! Here it is: {\"a\": {\"b\": 1}, \"c\": \"}\"} trailing {x}";
        assert_eq!(
            first_json_object(out),
            Some("{\"a\": {\"b\": 1}, \"c\": \"}\"}")
        );
        assert_eq!(first_json_object("no braces"), None);
        assert_eq!(first_json_object("{ never closed"), None);
    }

    #[test]
    fn test_content_tokens_drop_short() {
        assert_eq!(
            content_tokens("CNN on CIFAR-10, accuracy=92%"),
            vec!["cifar", "accuracy"]
        );
        assert_eq!(distinct_tokens("data data model"), vec!["data", "model"]);
    }
}
