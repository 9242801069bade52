//! Analysis thresholds and limits.
//!
//! Every value has a default; a TOML file passed with `--config` overrides
//! any subset of them.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub years: YearRange,
    pub contamination: ContaminationConfig,
    pub metrics: MetricsConfig,
    pub frequencies: FrequencyConfig,
    pub tfidf: TfidfConfig,
}

/// Inclusive year range of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct YearRange {
    pub start: u16,
    pub end: u16,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 1959,
            end: 2023,
        }
    }
}

impl YearRange {
    pub fn contains(&self, year: u16) -> bool {
        (self.start..=self.end).contains(&year)
    }

    /// Intersection with another range, `None` when disjoint.
    pub fn intersect(&self, other: &YearRange) -> Option<YearRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(YearRange { start, end })
    }
}

impl FromStr for YearRange {
    type Err = String;

    /// Parses `START-END`, e.g. `1980-1989`, or a single year.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|_| format!("invalid year '{}' in range '{}'", part.trim(), s))
        };
        let (start, end) = match s.split_once('-') {
            Some((a, b)) => (parse(a)?, parse(b)?),
            None => {
                let year = parse(s)?;
                (year, year)
            }
        };
        if start > end {
            return Err(format!("year range '{}' starts after it ends", s));
        }
        Ok(YearRange { start, end })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContaminationConfig {
    /// Songs longer than this many whitespace-delimited words are flagged.
    pub max_word_count: usize,
    /// Secondary signal, disabled unless configured.
    pub block_check: Option<BlockCheckConfig>,
}

impl Default for ContaminationConfig {
    fn default() -> Self {
        Self {
            max_word_count: 5000,
            block_check: None,
        }
    }
}

/// Flags long texts that arrive as a few giant lines (prose, not verse).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockCheckConfig {
    pub min_words: usize,
    pub max_words_per_line: f64,
}

impl Default for BlockCheckConfig {
    fn default() -> Self {
        Self {
            min_words: 300,
            max_words_per_line: 60.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Lexical diversity is null below this many normalized tokens.
    pub min_diversity_tokens: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            min_diversity_tokens: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrequencyConfig {
    pub top_n: usize,
    pub genre_decade_top_n: usize,
    /// Genre×decade groups with fewer tokens are left out.
    pub genre_decade_min_tokens: usize,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            top_n: 30,
            genre_decade_top_n: 25,
            genre_decade_min_tokens: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TfidfConfig {
    pub genre_top_n: usize,
    pub genre_decade_top_n: usize,
    pub genre_max_features: usize,
    pub genre_decade_max_features: usize,
    /// Terms present in more than this share of the documents are pruned.
    pub max_df: f64,
    pub min_term_len: usize,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            genre_top_n: 20,
            genre_decade_top_n: 15,
            genre_max_features: 5000,
            genre_decade_max_features: 3000,
            max_df: 0.9,
            min_term_len: 3,
        }
    }
}

impl AnalysisConfig {
    /// Load from `path`, or defaults when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            None => Self::default(),
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
                toml::from_str(&text).map_err(|source| Error::Toml {
                    origin: path.display().to_string(),
                    source,
                })?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.years.start > self.years.end {
            return Err(invalid("years.start is after years.end"));
        }
        if self.contamination.max_word_count == 0 {
            return Err(invalid("contamination.max_word_count must be positive"));
        }
        if let Some(block) = &self.contamination.block_check {
            if !(block.max_words_per_line > 0.0) {
                return Err(invalid("block_check.max_words_per_line must be positive"));
            }
        }
        if !(self.tfidf.max_df > 0.0 && self.tfidf.max_df <= 1.0) {
            return Err(invalid("tfidf.max_df must be in (0, 1]"));
        }
        if self.tfidf.min_term_len < 2 {
            return Err(invalid("tfidf.min_term_len must be at least 2"));
        }
        if self.tfidf.genre_max_features == 0 || self.tfidf.genre_decade_max_features == 0 {
            return Err(invalid("tfidf max_features must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidConfig(msg.to_string())
}
