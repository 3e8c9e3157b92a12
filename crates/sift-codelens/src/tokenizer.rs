//! Identifier-aware tokenization for lexical search.
//!
//! Words are split on underscores and on case boundaries, so `get_user_name`,
//! `getUserName` and `GetUserName` all produce the same base tokens. Adjacent
//! base tokens are then joined into bigrams and trigrams, which lets a query
//! for `user_name` favour chunks where the two words appear together.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\w+").expect("invalid word regex"))
}

/// Tokenize `text` into base tokens followed by bigrams and trigrams.
///
/// # Examples
///
/// ```
/// use sift_codelens::tokenizer::tokenize;
///
/// assert_eq!(
///     tokenize("getUserName"),
///     vec!["get", "user", "name", "get_user", "user_name", "get_user_name"],
/// );
/// assert!(tokenize("x").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let base = base_tokens(text);
    let mut tokens = Vec::with_capacity(base.len() * 3);

    for window in base.windows(2) {
        tokens.push(window.join("_"));
    }
    for window in base.windows(3) {
        tokens.push(window.join("_"));
    }

    let mut all = base;
    all.append(&mut tokens);
    all
}

/// Tokenize `text` without n-grams.
///
/// # Examples
///
/// ```
/// use sift_codelens::tokenizer::base_tokens;
///
/// assert_eq!(base_tokens("HTTPServer.max_retry_count"), vec!["http", "server", "max", "retry", "count"]);
/// ```
pub fn base_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for m in word_regex().find_iter(text) {
        let word = m.as_str();

        if word.contains('_') {
            tokens.extend(word.split('_').filter_map(keep));
            continue;
        }

        let parts = split_identifier(word);
        if parts.is_empty() {
            tokens.extend(keep(word));
        } else {
            tokens.extend(parts.into_iter().filter_map(keep));
        }
    }

    tokens
}

/// Count occurrences of every token [`tokenize`] produces.
pub fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

fn keep(part: &str) -> Option<String> {
    (part.chars().count() > 1).then(|| part.to_lowercase())
}

/// Split a word into `Upper+lower`, `lower` and acronym runs.
///
/// An acronym run only ends where another capital or the end of the word
/// follows, so the capital that starts the next word is left for it:
/// `HTTPServer` gives `HTTP` and `Server`. Characters that fit none of the
/// three shapes (digits, non-ASCII letters) are skipped.
fn split_identifier(word: &str) -> Vec<&str> {
    let bytes = word.as_bytes();
    let mut parts = Vec::new();
    let mut i = 0;

    let lower_run = |from: usize| {
        let mut j = from;
        while j < bytes.len() && bytes[j].is_ascii_lowercase() {
            j += 1;
        }
        j
    };

    while i < bytes.len() {
        let c = bytes[i];

        if c.is_ascii_uppercase() && bytes.get(i + 1).is_some_and(u8::is_ascii_lowercase) {
            let end = lower_run(i + 1);
            parts.push(&word[i..end]);
            i = end;
        } else if c.is_ascii_lowercase() {
            let end = lower_run(i);
            parts.push(&word[i..end]);
            i = end;
        } else if c.is_ascii_uppercase() {
            let mut end = i;
            while end < bytes.len() && bytes[end].is_ascii_uppercase() {
                end += 1;
            }
            if end < bytes.len() {
                // the last capital belongs to the next word
                end -= 1;
            }
            if end > i {
                parts.push(&word[i..end]);
                i = end;
            } else {
                i += 1;
            }
        } else {
            // step over one whole character
            i += word[i..].chars().next().map_or(1, char::len_utf8);
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_produces_ngrams_from_base_tokens() {
        assert_eq!(
            tokenize("getUserName"),
            vec![
                "get",
                "user",
                "name",
                "get_user",
                "user_name",
                "get_user_name"
            ]
        );
    }

    #[test]
    fn single_characters_are_dropped() {
        assert!(tokenize("x").is_empty());
        assert!(tokenize("a b c = 1").is_empty());
        assert_eq!(base_tokens("i += xCoord"), vec!["coord"]);
    }

    #[test]
    fn snake_case_is_split_on_underscores() {
        assert_eq!(base_tokens("max_retry_count"), vec!["max", "retry", "count"]);
        assert_eq!(base_tokens("__init__"), vec!["init"]);
        // parts of snake case are not further case-split
        assert_eq!(base_tokens("parse_HTTPRequest"), vec!["parse", "httprequest"]);
    }

    #[test]
    fn acronyms_release_their_last_capital() {
        assert_eq!(split_identifier("HTTPServer"), vec!["HTTP", "Server"]);
        assert_eq!(split_identifier("parseURL"), vec!["parse", "URL"]);
        assert_eq!(split_identifier("ABCdef"), vec!["AB", "Cdef"]);
        assert_eq!(split_identifier("Ab"), vec!["Ab"]);
    }

    #[test]
    fn digits_are_skipped_inside_identifiers() {
        assert_eq!(split_identifier("utf8Decode"), vec!["utf", "Decode"]);
        assert_eq!(base_tokens("sha256"), vec!["sha"]);
    }

    #[test]
    fn words_without_letter_runs_are_kept_whole() {
        assert_eq!(base_tokens("404 2024"), vec!["404", "2024"]);
        assert_eq!(base_tokens("日本語"), vec!["日本語"]);
        // ASCII letter runs win over the whole word
        assert_eq!(base_tokens("ünïcode"), vec!["code"]);
        assert_eq!(base_tokens("7"), Vec::<String>::new());
    }

    #[test]
    fn punctuation_separates_words() {
        assert_eq!(
            base_tokens("self.cache.get(key)"),
            vec!["self", "cache", "get", "key"]
        );
    }

    #[test]
    fn trigrams_need_three_base_tokens() {
        let tokens = tokenize("fooBar");
        assert_eq!(tokens, vec!["foo", "bar", "foo_bar"]);
    }

    #[test]
    fn term_counts_include_ngrams() {
        let counts = term_counts("user user name");
        assert_eq!(counts["user"], 2);
        assert_eq!(counts["name"], 1);
        assert_eq!(counts["user_user"], 1);
        assert_eq!(counts["user_name"], 1);
        assert_eq!(counts["user_user_name"], 1);
    }
}
