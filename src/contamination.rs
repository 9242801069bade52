//! Contamination detection: flags lyric fields that hold something other
//! than lyrics (book excerpts, TV scripts, runaway scrapes).
//!
//! The detector looks at one song at a time and never at corpus-wide
//! statistics. All predicates are evaluated and OR-ed; none takes
//! precedence over another.

use regex::{RegexSet, RegexSetBuilder};

use crate::config::{BlockCheckConfig, ContaminationConfig};
use crate::error::Result;
use crate::models::ContaminationSignals;

pub struct ContaminationDetector {
    max_word_count: usize,
    block_check: Option<BlockCheckConfig>,
    markers: Vec<String>,
    marker_set: RegexSet,
}

impl ContaminationDetector {
    /// Compile the marker list once. Markers that begin and end with an
    /// alphanumeric character match on word boundaries, others anywhere.
    pub fn new(markers: &[String], config: &ContaminationConfig) -> Result<Self> {
        let patterns: Vec<String> = markers.iter().map(|m| marker_pattern(m)).collect();
        let marker_set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            max_word_count: config.max_word_count,
            block_check: config.block_check.clone(),
            markers: markers.to_vec(),
            marker_set,
        })
    }

    /// Signals for one song, or `None` when the text looks like lyrics.
    /// Empty text is never contaminated; missing lyrics are tracked apart.
    pub fn detect(&self, text: &str, word_count: usize) -> Option<ContaminationSignals> {
        if text.trim().is_empty() {
            return None;
        }

        let signals = ContaminationSignals {
            over_length: word_count > self.max_word_count,
            markers: self
                .marker_set
                .matches(text)
                .into_iter()
                .map(|idx| self.markers[idx].clone())
                .collect(),
            unbroken_block: self
                .block_check
                .as_ref()
                .is_some_and(|check| is_unbroken_block(text, word_count, check)),
        };

        signals.any().then_some(signals)
    }

    pub fn is_contaminated(&self, text: &str, word_count: usize) -> bool {
        self.detect(text, word_count).is_some()
    }

    pub fn max_word_count(&self) -> usize {
        self.max_word_count
    }
}

fn marker_pattern(marker: &str) -> String {
    let escaped = regex::escape(marker);
    let bounded = marker.chars().next().is_some_and(|c| c.is_alphanumeric())
        && marker.chars().last().is_some_and(|c| c.is_alphanumeric());
    if bounded {
        format!(r"\b{}\b", escaped)
    } else {
        escaped
    }
}

/// Long text spread over very few lines reads as prose, not verse.
fn is_unbroken_block(text: &str, word_count: usize, check: &BlockCheckConfig) -> bool {
    if word_count < check.min_words {
        return false;
    }
    let lines = text.lines().filter(|l| !l.trim().is_empty()).count().max(1);
    word_count as f64 / lines as f64 > check.max_words_per_line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::word_count;
    use crate::reference::ReferenceTables;

    fn detector(config: &ContaminationConfig) -> ContaminationDetector {
        let tables = ReferenceTables::embedded().unwrap();
        ContaminationDetector::new(&tables.contamination_markers, config).unwrap()
    }

    fn check(d: &ContaminationDetector, text: &str) -> Option<ContaminationSignals> {
        d.detect(text, word_count(text))
    }

    #[test]
    fn test_short_text_with_marker_is_flagged() {
        let d = detector(&ContaminationConfig::default());
        let text = "guermantes guermantes guermantes guermantes\nguermantes guermantes guermantes guermantes";
        assert_eq!(word_count(text), 8);
        let signals = check(&d, text).unwrap();
        assert!(!signals.over_length);
        assert_eq!(signals.markers, vec!["guermantes".to_string()]);
    }

    #[test]
    fn test_over_length_plain_words_flagged() {
        let d = detector(&ContaminationConfig::default());
        let text = "love you baby tonight\n".repeat(2250);
        assert_eq!(word_count(&text), 9000);
        let signals = check(&d, &text).unwrap();
        assert!(signals.over_length);
        assert!(signals.markers.is_empty());
    }

    #[test]
    fn test_six_thousand_words_flagged_without_markers() {
        let d = detector(&ContaminationConfig::default());
        let text = "word ".repeat(6000);
        assert!(d.is_contaminated(&text, word_count(&text)));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let d = detector(&ContaminationConfig::default());
        let text = "word\n".repeat(5000);
        assert!(!d.is_contaminated(&text, 5000));
        assert!(d.is_contaminated(&text, 5001));
    }

    #[test]
    fn test_empty_lyrics_not_contaminated() {
        let d = detector(&ContaminationConfig::default());
        assert!(check(&d, "").is_none());
        assert!(check(&d, "  \n\t").is_none());
    }

    #[test]
    fn test_ordinary_lyrics_clean() {
        let d = detector(&ContaminationConfig::default());
        let text = "I want to hold your hand\nI want to hold your hand\nAnd when I touch you I feel happy inside";
        assert!(check(&d, text).is_none());
    }

    #[test]
    fn test_marker_needs_word_boundary() {
        let d = detector(&ContaminationConfig::default());
        // "swanning" must not hit the "swann" marker
        assert!(check(&d, "we were swanning around the town").is_none());
        assert!(check(&d, "Madame Swann walked in").is_some());
    }

    #[test]
    fn test_script_markers_match_anywhere() {
        let d = detector(&ContaminationConfig::default());
        let signals = check(&d, "[Scene: Central Perk]\nRachel: Oh hi").unwrap();
        assert!(signals.markers.contains(&"[scene".to_string()));
        assert!(signals.markers.contains(&"rachel:".to_string()));
    }

    #[test]
    fn test_block_check_disabled_by_default() {
        let d = detector(&ContaminationConfig::default());
        let text = "lorem ".repeat(400);
        assert!(check(&d, &text).is_none());
    }

    #[test]
    fn test_block_check_flags_prose_block() {
        let config = ContaminationConfig {
            block_check: Some(BlockCheckConfig::default()),
            ..Default::default()
        };
        let d = detector(&config);
        let prose = "lorem ".repeat(400);
        let signals = check(&d, &prose).unwrap();
        assert!(signals.unbroken_block);
        assert!(!signals.over_length);

        let verse = "lorem ipsum dolor sit\n".repeat(100);
        assert!(check(&d, &verse).is_none());
    }

    #[test]
    fn test_all_signals_recorded() {
        let d = detector(&ContaminationConfig::default());
        let text = format!("{} dedalus", "word ".repeat(6000));
        let signals = check(&d, &text).unwrap();
        assert!(signals.over_length);
        assert_eq!(signals.markers, vec!["dedalus".to_string()]);
    }
}
