use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::Offset;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
}

/// Tokenize text into (term, position) pairs using NFKC normalization and
/// lowercasing. Positions are token ordinals, so consecutive tokens differ by
/// exactly one; phrase queries rely on that. Every token is kept: stopword
/// removal or stemming would break positional adjacency.
pub fn tokenize(text: &str) -> Vec<(String, Offset)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .enumerate()
        .map(|(pos, mat)| (mat.as_str().to_string(), pos as Offset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_consecutive_ordinals() {
        let toks = tokenize("The cat, the CAT!");
        let expected: Vec<(String, Offset)> = [
            ("the", 0),
            ("cat", 1),
            ("the", 2),
            ("cat", 3),
        ]
        .into_iter()
        .map(|(w, p)| (w.to_string(), p))
        .collect();
        assert_eq!(toks, expected);
    }

    #[test]
    fn normalizes_unicode() {
        let toks = tokenize("Caf\u{e9} CAFE\u{301}");
        let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec!["café", "café"]);
    }
}
