//! Lexicon and rule based sentiment polarity.
//!
//! Runs over the cleaned lyric text with case and punctuation intact,
//! because the rules depend on them: negations flip the next sentiment
//! words, boosters and dampeners scale them, ALL-CAPS words and
//! exclamation marks add emphasis and a "but" shifts weight to the clause
//! that follows it.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{round_to, SentimentScores};

const EMBEDDED_SENTIMENT: &str = include_str!("../data/sentiment.toml");

/// Intensity added or removed by a booster or dampener.
const BOOST: f64 = 0.293;
/// Extra intensity of an ALL-CAPS sentiment word in mixed-case text.
const CAPS_BOOST: f64 = 0.733;
/// Multiplier applied to a word within reach of a negation.
const NEGATION_SCALAR: f64 = -0.74;
/// How many preceding words can modify a sentiment word.
const MODIFIER_WINDOW: usize = 3;
/// Normalization constant of the compound score.
const ALPHA: f64 = 15.0;

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentTables {
    pub boosters: Vec<String>,
    pub dampeners: Vec<String>,
    pub negations: Vec<String>,
    pub lexicon: BTreeMap<String, f64>,
}

impl SentimentTables {
    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_SENTIMENT, "embedded sentiment tables")
    }

    /// Load tables from `path`, or the embedded tables when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Self::embedded(),
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
                Self::parse(&text, &path.display().to_string())
            }
        }
    }

    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let tables: SentimentTables = toml::from_str(text).map_err(|source| Error::Toml {
            origin: origin.to_string(),
            source,
        })?;
        if tables.lexicon.is_empty() {
            return Err(Error::InvalidReference("sentiment lexicon is empty".into()));
        }
        if let Some((word, valence)) = tables
            .lexicon
            .iter()
            .find(|(_, v)| !(-4.0..=4.0).contains(*v))
        {
            return Err(Error::InvalidReference(format!(
                "valence {} of '{}' is outside -4..=4",
                valence, word
            )));
        }
        Ok(tables)
    }
}

pub struct SentimentAnalyzer {
    lexicon: FxHashMap<String, f64>,
    /// Booster words map to +BOOST, dampeners to -BOOST.
    modifiers: FxHashMap<String, f64>,
    negations: FxHashSet<String>,
}

/// One whitespace word: lookup key plus the shape cues the rules need.
struct Word {
    key: String,
    all_caps: bool,
}

impl Word {
    fn new(raw: &str) -> Self {
        let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let all_caps = trimmed.chars().filter(|c| c.is_alphabetic()).count() > 1
            && trimmed
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(|c| c.is_uppercase());
        let key = trimmed
            .chars()
            .filter(|c| *c != '\'' && *c != '\u{2019}')
            .flat_map(char::to_lowercase)
            .collect();
        Self { key, all_caps }
    }
}

impl SentimentAnalyzer {
    pub fn new(tables: &SentimentTables) -> Self {
        let modifiers = tables
            .boosters
            .iter()
            .map(|w| (w.to_lowercase(), BOOST))
            .chain(tables.dampeners.iter().map(|w| (w.to_lowercase(), -BOOST)))
            .collect();
        Self {
            lexicon: tables
                .lexicon
                .iter()
                .map(|(w, v)| (w.to_lowercase(), *v))
                .collect(),
            modifiers,
            negations: tables.negations.iter().map(|w| w.replace('\'', "").to_lowercase()).collect(),
        }
    }

    /// Scores for one text. Empty or wordless text scores all zeros.
    pub fn analyze(&self, text: &str) -> SentimentScores {
        let words: Vec<Word> = text
            .split_whitespace()
            .map(Word::new)
            .filter(|w| !w.key.is_empty())
            .collect();
        if words.is_empty() {
            return SentimentScores {
                positive: 0.0,
                negative: 0.0,
                neutral: 0.0,
                compound: 0.0,
            };
        }

        let caps_differential = {
            let caps = words.iter().filter(|w| w.all_caps).count();
            caps > 0 && caps < words.len()
        };

        let mut valences: Vec<f64> = (0..words.len())
            .map(|i| self.word_valence(&words, i, caps_differential))
            .collect();
        apply_but_rule(&words, &mut valences);

        let emphasis = punctuation_emphasis(text);
        let sum: f64 = valences.iter().sum();
        let sum = if sum > 0.0 {
            sum + emphasis
        } else if sum < 0.0 {
            sum - emphasis
        } else {
            sum
        };

        let (positive, negative, neutral) = proportions(&valences, emphasis);
        SentimentScores {
            positive: round_to(positive, 3),
            negative: round_to(negative, 3),
            neutral: round_to(neutral, 3),
            compound: round_to(compound(sum), 3),
        }
    }

    fn word_valence(&self, words: &[Word], i: usize, caps_differential: bool) -> f64 {
        let word = &words[i];
        if self.modifiers.contains_key(&word.key) {
            return 0.0;
        }
        let Some(&base) = self.lexicon.get(&word.key) else {
            return 0.0;
        };

        let mut valence = base;
        if word.all_caps && caps_differential {
            valence += CAPS_BOOST.copysign(valence);
        }

        for distance in 1..=MODIFIER_WINDOW.min(i) {
            let prev = &words[i - distance];
            if self.lexicon.contains_key(&prev.key) {
                continue;
            }
            if let Some(&modifier) = self.modifiers.get(&prev.key) {
                // modifiers scale intensity away from or towards zero
                let mut scalar = if valence < 0.0 { -modifier } else { modifier };
                if prev.all_caps && caps_differential {
                    scalar += if valence > 0.0 { CAPS_BOOST } else { -CAPS_BOOST };
                }
                scalar *= match distance {
                    1 => 1.0,
                    2 => 0.95,
                    _ => 0.9,
                };
                valence += scalar;
            }
            if self.negations.contains(&prev.key) {
                valence *= NEGATION_SCALAR;
            }
        }
        valence
    }
}

/// Words before "but" count half, words after it count one and a half.
fn apply_but_rule(words: &[Word], valences: &mut [f64]) {
    if let Some(pivot) = words.iter().position(|w| w.key == "but") {
        for (i, v) in valences.iter_mut().enumerate() {
            if i < pivot {
                *v *= 0.5;
            } else if i > pivot {
                *v *= 1.5;
            }
        }
    }
}

/// Emphasis from "!" (up to four) and repeated "?" (more than one).
fn punctuation_emphasis(text: &str) -> f64 {
    let exclamations = text.matches('!').count().min(4) as f64 * 0.292;
    let questions = text.matches('?').count();
    let question_emphasis = match questions {
        0 | 1 => 0.0,
        2 | 3 => questions as f64 * 0.18,
        _ => 0.96,
    };
    exclamations + question_emphasis
}

fn compound(sum: f64) -> f64 {
    (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
}

/// Positive, negative and neutral shares of the text's sentiment mass.
fn proportions(valences: &[f64], emphasis: f64) -> (f64, f64, f64) {
    let mut pos_sum = 0.0;
    let mut neg_sum = 0.0;
    let mut neutral = 0.0;
    for v in valences {
        if *v > 0.0 {
            pos_sum += v + 1.0;
        } else if *v < 0.0 {
            neg_sum += v - 1.0;
        } else {
            neutral += 1.0;
        }
    }
    if pos_sum > neg_sum.abs() {
        pos_sum += emphasis;
    } else if pos_sum < neg_sum.abs() {
        neg_sum -= emphasis;
    }
    let total = pos_sum + neg_sum.abs() + neutral;
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    (pos_sum / total, neg_sum.abs() / total, neutral / total)
}
