//! Per-song metrics: word count, lexical diversity and sentiment.

use rustc_hash::FxHashSet;

use crate::models::{round_to, SongMetrics};
use crate::sentiment::SentimentAnalyzer;

/// Raw whitespace-delimited word count, before any normalization.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Type-token ratio over a normalized token stream, in [0, 1].
///
/// `None` when there are fewer than `min_tokens` tokens, and always `None`
/// for an empty stream.
pub fn lexical_diversity(tokens: &[String], min_tokens: usize) -> Option<f64> {
    if tokens.is_empty() || tokens.len() < min_tokens {
        return None;
    }
    let unique: FxHashSet<&str> = tokens.iter().map(String::as_str).collect();
    Some(round_to(unique.len() as f64 / tokens.len() as f64, 3))
}

pub struct MetricCalculator {
    sentiment: SentimentAnalyzer,
    min_diversity_tokens: usize,
}

impl MetricCalculator {
    pub fn new(sentiment: SentimentAnalyzer, min_diversity_tokens: usize) -> Self {
        Self {
            sentiment,
            min_diversity_tokens,
        }
    }

    /// Metrics of one clean song. `cleaned` is the annotation-free lyric
    /// text, `tokens` its metric-profile token stream.
    ///
    /// `None` when cleaning left no words, e.g. lyrics that were only an
    /// `[Instrumental]` tag: such a song has nothing to measure.
    pub fn compute(&self, word_count: usize, cleaned: &str, tokens: &[String]) -> Option<SongMetrics> {
        if !cleaned.chars().any(char::is_alphanumeric) {
            return None;
        }
        Some(SongMetrics {
            word_count,
            sentiment: self.sentiment.analyze(cleaned),
            lexical_diversity: lexical_diversity(tokens, self.min_diversity_tokens),
        })
    }
}
