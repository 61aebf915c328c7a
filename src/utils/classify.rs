//! Name classification: file base names to Pascal-cased model and mixin names.

use fancy_regex::Regex;
use once_cell::sync::Lazy;

/// Word boundaries: separators, lower→upper transitions, acronyms followed by a
/// capitalized word, and letter/digit transitions. Letters of caseless scripts
/// form words of their own.
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\p{Lu}+(?=\p{Lu}\p{Ll})|\p{Lu}?[\p{Ll}\p{M}]+|\p{Lu}+|\p{N}+|[^\P{L}\p{Lu}\p{Ll}]+",
    )
    .expect("valid word regex")
});

/// Split `name` into words.
pub fn words(name: &str) -> Vec<&str> {
    WORD_RE.find_iter(name).filter_map(Result::ok).map(|m| m.as_str()).collect()
}

/// Pascal-case a file base name: `my-model` → `MyModel`, `time_stamp` →
/// `TimeStamp`, `XMLHttpRequest` → `XMLHttpRequest`.
///
/// Only the first letter of each word is changed.
pub fn classify(name: &str) -> String {
    words(name)
        .into_iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
