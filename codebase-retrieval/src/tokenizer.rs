//! Text normalization shared by indexing and querying.
//!
//! Index-time and query-time text must go through [`tokenize`] alike, or
//! BM25 scores stop meaning anything.

/// Characters that split pieces apart. `_` and `-` are deliberately absent so
/// identifiers survive as a whole and are decomposed afterwards.
const SEPARATORS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '<', '>', '"', '\'', '`', '/',
    '\\', '|', '@', '#', '$', '%', '^', '&', '*', '+', '=', '~',
];

/// Common English words dropped from both documents and queries, in any case
const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do", "does", "for", "from",
    "has", "have", "if", "in", "into", "is", "it", "its", "of", "on", "or", "so", "such", "that",
    "the", "their", "then", "there", "these", "they", "this", "to", "was", "were", "will", "with",
];

/// Turn free text into lowercase tokens, preserving emission order.
///
/// Each piece yields its lowercased form, then its camelCase segments, then
/// its snake/kebab segments (each of those camel-split too). Variants of one
/// piece are emitted once; repeats across pieces are kept so term
/// frequencies stay meaningful.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for piece in text
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|piece| !piece.is_empty())
    {
        let mut variants: Vec<String> = Vec::new();
        let mut push = |token: String| {
            if !variants.contains(&token) {
                variants.push(token);
            }
        };

        push(piece.to_lowercase());

        let is_compound = piece.contains(['_', '-']);
        if !is_compound {
            for segment in camel_segments(piece) {
                push(segment.to_lowercase());
            }
        } else {
            for segment in piece.split(['_', '-']).filter(|s| !s.is_empty()) {
                push(segment.to_lowercase());
                for sub in camel_segments(segment) {
                    push(sub.to_lowercase());
                }
            }
        }

        tokens.extend(variants.into_iter().filter(|token| keep(token)));
    }

    tokens
}

fn keep(token: &str) -> bool {
    token.chars().count() > 1
        && !STOP_WORDS.contains(&token)
        && token.chars().any(char::is_alphanumeric)
}

/// Split before uppercase letters that start a new word.
///
/// A run of capitals stays together as an acronym, so `HTTPServer` becomes
/// `HTTP` and `Server` rather than single letters.
fn camel_segments(piece: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = piece.char_indices().collect();
    let mut segments = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (idx, c) = chars[i];
        if !c.is_uppercase() {
            continue;
        }
        let prev = chars[i - 1].1;
        let next_is_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());
        let boundary =
            prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower);
        if boundary {
            segments.push(&piece[start..idx]);
            start = idx;
        }
    }
    segments.push(&piece[start..]);

    if segments.len() > 1 {
        segments
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn set(tokens: &[String]) -> BTreeSet<String> {
        tokens.iter().cloned().collect()
    }

    #[test]
    fn test_basic_lowercase_and_punctuation() {
        assert_eq!(
            tokenize("Connect(Database).pool"),
            vec!["connect", "database", "pool"]
        );
    }

    #[test]
    fn test_camel_case_decomposition() {
        assert_eq!(tokenize("getUserName"), vec!["getusername", "get", "user", "name"]);
        assert_eq!(tokenize("HTTPServer"), vec!["httpserver", "http", "server"]);
    }

    #[test]
    fn test_snake_and_kebab_decomposition() {
        assert_eq!(
            tokenize("parse_config_file"),
            vec!["parse_config_file", "parse", "config", "file"]
        );
        assert_eq!(tokenize("vector-store"), vec!["vector-store", "vector", "store"]);
        assert_eq!(
            tokenize("load_userProfile"),
            vec!["load_userprofile", "load", "userprofile", "user", "profile"]
        );
    }

    #[test]
    fn test_drops_short_stop_and_symbol_tokens() {
        assert_eq!(tokenize("a is the x -- of handler"), vec!["handler"]);
    }

    #[test]
    fn test_every_stop_word_is_dropped_in_any_case() {
        for word in STOP_WORDS {
            assert!(tokenize(word).is_empty(), "{word}");
            assert!(tokenize(&word.to_uppercase()).is_empty(), "{word}");
        }
    }

    #[test]
    fn test_repeats_across_pieces_are_kept() {
        assert_eq!(tokenize("pool pool"), vec!["pool", "pool"]);
    }

    #[test]
    fn test_unicode_length_counts_chars() {
        assert_eq!(tokenize("é données"), vec!["données"]);
    }

    #[test]
    fn test_retokenizing_is_stable() {
        for text in [
            "fn getUserName(id: u32) -> String",
            "parse_config_file and HTTPServer",
            "load_userProfile vector-store",
            "user authentication handler",
        ] {
            let first = tokenize(text);
            let second = tokenize(&first.join(" "));
            assert_eq!(set(&first), set(&second), "unstable for {text:?}");
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "impl Bm25Engine { fn build_index(&mut self) }";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ... ;; ").is_empty());
    }
}
