//! Most frequent words per partition, for the dashboard bar charts.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::Partition;
use crate::config::FrequencyConfig;
use crate::models::{Song, WordCount};
use crate::normalize::SongTokens;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WordFrequencies {
    pub by_genre: BTreeMap<String, Vec<WordCount>>,
    pub by_decade: BTreeMap<String, Vec<WordCount>>,
    pub by_genre_decade: BTreeMap<String, Vec<WordCount>>,
}

impl WordFrequencies {
    /// Count metric-profile tokens of clean songs. `tokens[i]` belongs to
    /// `songs[i]`.
    pub fn compute(songs: &[Song], tokens: &[SongTokens], config: &FrequencyConfig) -> Self {
        Self {
            by_genre: by_partition(songs, tokens, Partition::Genre, config.top_n, 0),
            by_decade: by_partition(songs, tokens, Partition::Decade, config.top_n, 0),
            by_genre_decade: by_partition(
                songs,
                tokens,
                Partition::GenreDecade,
                config.genre_decade_top_n,
                config.genre_decade_min_tokens,
            ),
        }
    }
}

fn by_partition(
    songs: &[Song],
    tokens: &[SongTokens],
    partition: Partition,
    top_n: usize,
    min_tokens: usize,
) -> BTreeMap<String, Vec<WordCount>> {
    let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (song, toks) in songs.iter().zip(tokens) {
        if !song.is_analyzable() {
            continue;
        }
        groups
            .entry(partition.key(song))
            .or_default()
            .extend(toks.metric.iter().map(String::as_str));
    }
    groups
        .into_iter()
        .filter(|(_, words)| !words.is_empty() && words.len() >= min_tokens)
        .map(|(key, words)| (key, top_words(words, top_n)))
        .collect()
}

/// Top `n` words by count. Equal counts keep first-seen order.
pub fn top_words<'a>(words: impl IntoIterator<Item = &'a str>, n: usize) -> Vec<WordCount> {
    // word -> (count, first position)
    let mut counts: FxHashMap<&str, (usize, usize)> = FxHashMap::default();
    for (pos, word) in words.into_iter().enumerate() {
        counts.entry(word).or_insert((0, pos)).0 += 1;
    }
    let mut ranked: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(w, (c, first))| (w, c, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(n)
        .map(|(word, count, _)| WordCount {
            word: word.to_string(),
            count,
        })
        .collect()
}
