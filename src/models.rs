//! Core data models for the lyrics analysis pipeline.
//!
//! This module contains the song records, the closed genre taxonomy, the
//! derived aggregate/keyword views and the run statistics used throughout
//! the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Genre Taxonomy
// ============================================================================

/// Closed genre taxonomy. `Other` is the fallback; there is no "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Rock,
    Pop,
    Rnb,
    Hiphop,
    Country,
    Dance,
    Other,
}

impl Genre {
    /// Taxonomy order, used wherever genres are listed.
    pub const ALL: [Genre; 7] = [
        Genre::Rock,
        Genre::Pop,
        Genre::Rnb,
        Genre::Hiphop,
        Genre::Country,
        Genre::Dance,
        Genre::Other,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Genre::Rock => "rock",
            Genre::Pop => "pop",
            Genre::Rnb => "rnb",
            Genre::Hiphop => "hiphop",
            Genre::Country => "country",
            Genre::Dance => "dance",
            Genre::Other => "other",
        }
    }

    /// Display label for the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Genre::Rock => "Rock",
            Genre::Pop => "Pop",
            Genre::Rnb => "R&B / Soul",
            Genre::Hiphop => "Hip-Hop / Rap",
            Genre::Country => "Country",
            Genre::Dance => "Dance / Electronic",
            Genre::Other => "Other",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Genre {
    type Err = String;

    /// Accepts the taxonomy codes plus the common spellings found in source
    /// genre hints ("R&B", "hip-hop", "electronic", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "rock" | "hardrock" | "softrock" | "metal" | "punk" | "grunge" | "alternative" => {
                Ok(Genre::Rock)
            }
            "pop" | "poprock" | "teenpop" => Ok(Genre::Pop),
            "rnb" | "rb" | "randb" | "soul" | "rbsoul" | "rnbsoul" | "funk" | "motown" => Ok(Genre::Rnb),
            "hiphop" | "rap" | "hiphoprap" | "trap" => Ok(Genre::Hiphop),
            "country" | "countrypop" | "bluegrass" => Ok(Genre::Country),
            "dance" | "electronic" | "edm" | "disco" | "house" | "danceelectronic" => {
                Ok(Genre::Dance)
            }
            "other" => Ok(Genre::Other),
            _ => Err(format!("unknown genre '{}'", s)),
        }
    }
}

/// Decade grouping key: `(year / 10) * 10`.
pub fn decade_of(year: u16) -> u16 {
    (year / 10) * 10
}

/// Decade key string, e.g. `1980s`.
pub fn decade_key(decade: u16) -> String {
    format!("{}s", decade)
}

/// Round to a fixed number of decimals so the report is stable across
/// platforms and runs.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // avoid "-0.0" in the report
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

// ============================================================================
// Songs
// ============================================================================

/// Stable song identifier: `{year}_{rank:03}`, `{year}_000` without a rank,
/// with a `-n` suffix when the dataset repeats a (year, rank) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SongId(String);

impl SongId {
    pub fn new(year: u16, rank: Option<u16>) -> Self {
        SongId(format!("{}_{:03}", year, rank.unwrap_or(0)))
    }

    pub fn with_suffix(&self, n: usize) -> Self {
        SongId(format!("{}-{}", self.0, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Song fields as they arrive from the ingestion adapter, before any
/// annotation.
#[derive(Clone, Debug)]
pub struct RawSong {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub year: u16,
    pub rank: Option<u16>,
    pub album: Option<String>,
    pub genre_hint: Option<String>,
    pub spotify_id: Option<String>,
    pub lyrics: String,
}

impl RawSong {
    pub fn has_lyrics(&self) -> bool {
        !self.lyrics.trim().is_empty()
    }
}

/// Sentiment breakdown; `compound` is the polarity in [-1, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub compound: f64,
}

/// Per-song metrics. Only ever present on clean, lyric-bearing songs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SongMetrics {
    pub word_count: usize,
    pub sentiment: SentimentScores,
    /// Null when the normalized token stream is too short to be meaningful.
    pub lexical_diversity: Option<f64>,
}

/// Which contamination predicates fired. Predicates are independent and
/// OR-ed; all of them are evaluated so the audit trail is complete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContaminationSignals {
    pub over_length: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<String>,
    pub unbroken_block: bool,
}

impl ContaminationSignals {
    pub fn any(&self) -> bool {
        self.over_length || !self.markers.is_empty() || self.unbroken_block
    }
}

/// A fully annotated song. Constructed once, after contamination detection,
/// classification and metric calculation; never mutated afterwards.
#[derive(Clone, Debug)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub year: u16,
    pub rank: Option<u16>,
    pub album: Option<String>,
    pub spotify_id: Option<String>,
    pub raw_lyrics: String,
    pub genre: Genre,
    pub lyrics_available: bool,
    /// `Some` when the lyrics field holds non-lyric text.
    pub contamination: Option<ContaminationSignals>,
    pub metrics: Option<SongMetrics>,
}

impl Song {
    pub fn contaminated(&self) -> bool {
        self.contamination.is_some()
    }

    pub fn decade(&self) -> u16 {
        decade_of(self.year)
    }

    /// Clean, lyric-bearing songs: the only ones that feed metrics,
    /// frequencies and TF-IDF.
    pub fn is_analyzable(&self) -> bool {
        self.lyrics_available && !self.contaminated()
    }

    pub fn exclusion(&self) -> Option<ExclusionReason> {
        if self.contaminated() {
            Some(ExclusionReason::Contaminated)
        } else if !self.lyrics_available {
            Some(ExclusionReason::MissingLyrics)
        } else {
            None
        }
    }
}

/// Why a song carries no metrics. Missing lyrics is distinct from
/// contamination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MissingLyrics,
    Contaminated,
}

// ============================================================================
// Derived Views
// ============================================================================

/// Summary statistics for one partition.
///
/// `count` covers every song in the partition (contaminated or not);
/// `clean_count` is the number of songs whose metrics feed the means.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Aggregate {
    pub label: String,
    pub count: usize,
    pub clean_count: usize,
    pub lyrics_available: usize,
    pub contaminated: usize,
    pub avg_sentiment: Option<f64>,
    pub avg_lexical_diversity: Option<f64>,
    pub avg_word_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<std::collections::BTreeMap<Genre, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decades: Option<std::collections::BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_range: Option<[u16; 2]>,
}

/// One distinctive keyword of a partition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TfidfEntry {
    pub word: String,
    pub score: f64,
}

/// One frequent word of a partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run counters for ingestion and annotation.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Ingestion
    pub records_read: usize,
    pub rejected_unreadable: usize,
    pub rejected_year: usize,
    pub rejected_rank: usize,
    pub outside_year_range: usize,
    pub duplicate_ids: usize,

    // Annotation
    pub total_songs: usize,
    pub songs_with_lyrics: usize,
    pub missing_lyrics: usize,
    pub contaminated: usize,
    pub contaminated_over_length: usize,
    pub contaminated_marker: usize,
    pub contaminated_block: usize,
    pub diversity_undefined: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Share of songs flagged as contaminated, as a percentage
    pub fn contamination_rate(&self) -> f64 {
        if self.total_songs == 0 {
            0.0
        } else {
            100.0 * self.contaminated as f64 / self.total_songs as f64
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected_unreadable + self.rejected_year + self.rejected_rank
    }

    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
