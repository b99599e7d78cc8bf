/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimate the water, in liters, spent generating `text`.
///
/// Linear in the word count: `words * ml_per_word / 1000`.
pub fn estimate(text: &str, ml_per_word: f64) -> f64 {
    let words = word_count(text);
    if words == 0 {
        return 0.0;
    }
    words as f64 * ml_per_word / 1000.0
}
