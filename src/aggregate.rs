//! Aggregation over song partitions.
//!
//! Counts include every song in a partition; the means only cover clean,
//! metric-bearing songs. Both numbers are kept as separate fields so the
//! contamination impact of each partition stays auditable.

use std::collections::BTreeMap;

use crate::models::{decade_key, round_to, Aggregate, Genre, Song};

/// A grouping key over the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Year,
    Decade,
    Genre,
    GenreDecade,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::Year,
        Partition::Decade,
        Partition::Genre,
        Partition::GenreDecade,
    ];

    /// Section name in the report (`by_year`, ...).
    pub fn section(self) -> &'static str {
        match self {
            Partition::Year => "by_year",
            Partition::Decade => "by_decade",
            Partition::Genre => "by_genre",
            Partition::GenreDecade => "by_genre_decade",
        }
    }

    /// Map key of a song: `1985`, `1980s`, `rock`, `rock_1980s`.
    pub fn key(self, song: &Song) -> String {
        match self {
            Partition::Year => song.year.to_string(),
            Partition::Decade => decade_key(song.decade()),
            Partition::Genre => song.genre.code().to_string(),
            Partition::GenreDecade => genre_decade_key(song.genre, song.decade()),
        }
    }

    pub fn label(self, song: &Song) -> String {
        match self {
            Partition::Year => song.year.to_string(),
            Partition::Decade => decade_key(song.decade()),
            Partition::Genre => song.genre.label().to_string(),
            Partition::GenreDecade => {
                format!("{} {}", song.genre.label(), decade_key(song.decade()))
            }
        }
    }
}

pub fn genre_decade_key(genre: Genre, decade: u16) -> String {
    format!("{}_{}", genre.code(), decade_key(decade))
}

/// Running sums for one partition. Songs are folded in canonical id
/// order, so float sums are reproducible.
#[derive(Debug, Default)]
struct Accumulator {
    label: String,
    count: usize,
    clean_count: usize,
    lyrics_available: usize,
    contaminated: usize,
    sentiment: Mean,
    diversity: Mean,
    word_count: Mean,
    genres: BTreeMap<Genre, usize>,
    decades: BTreeMap<String, usize>,
    first_year: Option<u16>,
    last_year: Option<u16>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    n: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.n += 1;
    }

    fn value(self) -> Option<f64> {
        (self.n > 0).then(|| round_to(self.sum / self.n as f64, 3))
    }
}

impl Accumulator {
    fn add(&mut self, song: &Song) {
        self.count += 1;
        if song.lyrics_available {
            self.lyrics_available += 1;
        }
        if song.contaminated() {
            self.contaminated += 1;
        }
        *self.genres.entry(song.genre).or_default() += 1;
        *self.decades.entry(decade_key(song.decade())).or_default() += 1;
        self.first_year = Some(self.first_year.map_or(song.year, |y| y.min(song.year)));
        self.last_year = Some(self.last_year.map_or(song.year, |y| y.max(song.year)));

        // metrics only exist on clean songs; check anyway so a contaminated
        // song can never reach a mean
        if let Some(metrics) = song.metrics.as_ref().filter(|_| song.is_analyzable()) {
            self.clean_count += 1;
            self.sentiment.push(metrics.sentiment.compound);
            self.word_count.push(metrics.word_count as f64);
            if let Some(ttr) = metrics.lexical_diversity {
                self.diversity.push(ttr);
            }
        }
    }

    fn finish(self, partition: Partition) -> Aggregate {
        let (genres, decades, year_range) = match partition {
            Partition::Year | Partition::Decade => (Some(self.genres), None, None),
            Partition::Genre => (
                None,
                Some(self.decades),
                self.first_year.zip(self.last_year).map(|(a, b)| [a, b]),
            ),
            Partition::GenreDecade => (None, None, None),
        };
        Aggregate {
            label: self.label,
            count: self.count,
            clean_count: self.clean_count,
            lyrics_available: self.lyrics_available,
            contaminated: self.contaminated,
            avg_sentiment: self.sentiment.value(),
            avg_lexical_diversity: self.diversity.value(),
            avg_word_count: self.word_count.value(),
            genres,
            decades,
            year_range,
        }
    }
}

/// One aggregate per key present in `songs`.
pub fn aggregate_by(songs: &[Song], partition: Partition) -> BTreeMap<String, Aggregate> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for song in songs {
        let acc = groups.entry(partition.key(song)).or_insert_with(|| Accumulator {
            label: partition.label(song),
            ..Default::default()
        });
        acc.add(song);
    }
    groups
        .into_iter()
        .map(|(key, acc)| (key, acc.finish(partition)))
        .collect()
}

/// All four aggregation sections of the report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Aggregations {
    pub by_year: BTreeMap<String, Aggregate>,
    pub by_decade: BTreeMap<String, Aggregate>,
    pub by_genre: BTreeMap<String, Aggregate>,
    pub by_genre_decade: BTreeMap<String, Aggregate>,
}

impl Aggregations {
    pub fn compute(songs: &[Song]) -> Self {
        Self {
            by_year: aggregate_by(songs, Partition::Year),
            by_decade: aggregate_by(songs, Partition::Decade),
            by_genre: aggregate_by(songs, Partition::Genre),
            by_genre_decade: aggregate_by(songs, Partition::GenreDecade),
        }
    }

    pub fn section(&self, partition: Partition) -> &BTreeMap<String, Aggregate> {
        match partition {
            Partition::Year => &self.by_year,
            Partition::Decade => &self.by_decade,
            Partition::Genre => &self.by_genre,
            Partition::GenreDecade => &self.by_genre_decade,
        }
    }
}
