//! Estimates how long a post takes to read from the words in its
//! [`Section`]s.

use crate::post::Section;

/// The assumed reading speed.
pub const WORDS_PER_MINUTE: usize = 200;

/// Counts whitespace-delimited words. Empty or all-whitespace input has no
/// words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Returns the estimated reading time, in whole minutes, of a post made of
/// `sections`. Both the heading and the plain-text body of every section
/// count, and any partial minute rounds up to a full one.
pub fn estimate(sections: &[Section]) -> usize {
    let words: usize = sections
        .iter()
        .map(|s| count_words(&s.heading) + count_words(&s.body.as_text()))
        .sum();
    (words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE
}
