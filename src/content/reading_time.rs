//! Reading-time estimate for a post

use super::ContentSection;

/// Assumed reading speed
pub const WORDS_PER_MINUTE: usize = 200;

/// Whitespace-separated words across every section body and heading
pub fn count_words(sections: &[ContentSection]) -> usize {
    let bodies = sections.iter().map(|s| s.body.as_text(" "));
    let headings = sections.iter().map(|s| s.heading.clone());

    bodies
        .chain(headings)
        .map(|group| group.split_whitespace().count())
        .sum()
}

/// Whole minutes needed to read `words`, rounded up
pub fn minutes_for_words(words: usize) -> u32 {
    words.div_ceil(WORDS_PER_MINUTE) as u32
}

/// Estimated minutes to read the given content
pub fn estimate_reading_time(sections: &[ContentSection]) -> u32 {
    minutes_for_words(count_words(sections))
}
