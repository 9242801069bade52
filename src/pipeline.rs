//! Pipeline orchestration.
//!
//! Phase 1 annotates every song independently (contamination, genre,
//! metrics) on the rayon pool. Phase 2 starts only after phase 1 has
//! finished for the whole corpus: aggregation, word frequencies and TF-IDF
//! read the annotated songs and their cached tokens.

use rayon::prelude::*;

use crate::aggregate::Aggregations;
use crate::config::AnalysisConfig;
use crate::contamination::ContaminationDetector;
use crate::error::Result;
use crate::frequency::WordFrequencies;
use crate::genre::GenreClassifier;
use crate::metrics::{word_count, MetricCalculator};
use crate::models::{RawSong, RunStats, Song};
use crate::normalize::{clean_lyrics, Normalizer, SongTokens};
use crate::progress::PhaseProgress;
use crate::reference::ReferenceTables;
use crate::sentiment::{SentimentAnalyzer, SentimentTables};
use crate::tfidf::{TfidfExtractor, TfidfTables};

/// Everything the report is built from.
#[derive(Debug)]
pub struct Analysis {
    /// Annotated songs in id order.
    pub songs: Vec<Song>,
    pub aggregations: Aggregations,
    pub word_frequencies: WordFrequencies,
    pub tfidf: TfidfTables,
    pub reference_version: String,
}

/// Read-only components of one run, built once from the reference tables
/// and shared by every worker.
pub struct Analyzer {
    normalizer: Normalizer,
    detector: ContaminationDetector,
    classifier: GenreClassifier,
    metrics: MetricCalculator,
    tfidf: TfidfExtractor,
    config: AnalysisConfig,
    reference_version: String,
}

impl Analyzer {
    pub fn new(
        config: &AnalysisConfig,
        tables: &ReferenceTables,
        sentiment: &SentimentTables,
    ) -> Result<Self> {
        config.validate()?;
        tables.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(tables, config.tfidf.min_term_len),
            detector: ContaminationDetector::new(&tables.contamination_markers, &config.contamination)?,
            classifier: GenreClassifier::from_reference(tables)?,
            metrics: MetricCalculator::new(
                SentimentAnalyzer::new(sentiment),
                config.metrics.min_diversity_tokens,
            ),
            tfidf: TfidfExtractor::new(config.tfidf.clone()),
            config: config.clone(),
            reference_version: tables.version.clone(),
        })
    }

    /// Analyzer over the embedded tables.
    pub fn with_defaults(config: &AnalysisConfig) -> Result<Self> {
        Self::new(config, &ReferenceTables::embedded()?, &SentimentTables::embedded()?)
    }

    /// Annotate one song. Depends on nothing but the song's own fields.
    ///
    /// Lyrics that clean down to no words (only section tags or notes) count
    /// as missing, not as a clean song with zero scores.
    pub fn annotate(&self, raw: RawSong) -> (Song, SongTokens) {
        let mut lyrics_available = raw.has_lyrics();
        let words = word_count(&raw.lyrics);
        let contamination = if lyrics_available {
            self.detector.detect(&raw.lyrics, words)
        } else {
            None
        };
        let genre = self
            .classifier
            .classify(&raw.artist, &raw.title, raw.year, raw.genre_hint.as_deref());

        let mut metrics = None;
        let mut tokens = SongTokens::default();
        if lyrics_available && contamination.is_none() {
            let cleaned = clean_lyrics(&raw.lyrics);
            let song_tokens = self.normalizer.song_tokens(&cleaned);
            match self.metrics.compute(words, &cleaned, &song_tokens.metric) {
                Some(m) => {
                    metrics = Some(m);
                    tokens = song_tokens;
                }
                None => {
                    tracing::debug!("{}: no words left after cleaning, treating as missing lyrics", raw.id);
                    lyrics_available = false;
                }
            }
        }

        let song = Song {
            id: raw.id,
            title: raw.title,
            artist: raw.artist,
            year: raw.year,
            rank: raw.rank,
            album: raw.album,
            spotify_id: raw.spotify_id,
            raw_lyrics: raw.lyrics,
            genre,
            lyrics_available,
            contamination,
            metrics,
        };
        (song, tokens)
    }

    /// Phase 1 over the whole corpus. Output order matches input order.
    pub fn annotate_all(&self, raws: Vec<RawSong>) -> (Vec<Song>, Vec<SongTokens>) {
        let progress = PhaseProgress::counted("ANNOTATE", raws.len() as u64, "Phase 1: Annotating songs");

        let annotated: Vec<(Song, SongTokens)> = raws
            .into_par_iter()
            .map(|raw| {
                let result = self.annotate(raw);
                progress.inc();
                result
            })
            .collect();

        progress.finish(&format!("Phase 1: Annotated {} songs", annotated.len()));
        annotated.into_iter().unzip()
    }

    /// Full run: phase 1, barrier, phase 2. `raws` must be sorted by id.
    pub fn run(&self, raws: Vec<RawSong>, stats: &mut RunStats) -> Analysis {
        let (songs, tokens) = self.annotate_all(raws);
        record_annotation_stats(&songs, stats);
        stats.log_phase("annotate");

        let progress = PhaseProgress::indeterminate("AGGREGATE", "Phase 2: Aggregating corpus");
        let aggregations = Aggregations::compute(&songs);
        let word_frequencies = WordFrequencies::compute(&songs, &tokens, &self.config.frequencies);
        let tfidf = self.tfidf.extract(&songs, &tokens);
        progress.finish(&format!(
            "Phase 2: Aggregated {} partitions",
            aggregations.by_year.len()
                + aggregations.by_decade.len()
                + aggregations.by_genre.len()
                + aggregations.by_genre_decade.len()
        ));

        Analysis {
            songs,
            aggregations,
            word_frequencies,
            tfidf,
            reference_version: self.reference_version.clone(),
        }
    }
}

fn record_annotation_stats(songs: &[Song], stats: &mut RunStats) {
    stats.total_songs = songs.len();
    for song in songs {
        if song.lyrics_available {
            stats.songs_with_lyrics += 1;
        } else {
            stats.missing_lyrics += 1;
        }
        if let Some(signals) = &song.contamination {
            stats.contaminated += 1;
            if signals.over_length {
                stats.contaminated_over_length += 1;
            }
            if !signals.markers.is_empty() {
                stats.contaminated_marker += 1;
            }
            if signals.unbroken_block {
                stats.contaminated_block += 1;
            }
        }
        if song
            .metrics
            .as_ref()
            .is_some_and(|m| m.lexical_diversity.is_none())
        {
            stats.diversity_undefined += 1;
        }
    }
    tracing::info!(
        "Annotated {} songs: {} with lyrics, {} missing, {} contaminated ({:.2}%)",
        stats.total_songs,
        stats.songs_with_lyrics,
        stats.missing_lyrics,
        stats.contaminated,
        stats.contamination_rate()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExclusionReason, Genre, SongId};

    fn raw(year: u16, rank: u16, artist: &str, lyrics: &str) -> RawSong {
        RawSong {
            id: SongId::new(year, Some(rank)),
            title: format!("Track {}", rank),
            artist: artist.to_string(),
            year,
            rank: Some(rank),
            album: None,
            genre_hint: None,
            spotify_id: None,
            lyrics: lyrics.to_string(),
        }
    }

    fn analyzer() -> Analyzer {
        Analyzer::with_defaults(&AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_annotate_clean_song() {
        let lyrics = "[Chorus]\nI love the way you move tonight\nDancing under neon lights forever\nHold me closer baby never let go";
        let (song, tokens) = analyzer().annotate(raw(1985, 1, "Madonna", lyrics));
        assert!(!song.contaminated());
        let metrics = song.metrics.unwrap();
        assert_eq!(metrics.word_count, word_count(lyrics));
        assert!(metrics.sentiment.compound > 0.0);
        assert!(!tokens.metric.is_empty());
        assert!(!tokens.keywords.iter().any(|t| t == "chorus"));
    }

    #[test]
    fn test_missing_lyrics_is_not_contamination() {
        let (song, tokens) = analyzer().annotate(raw(1985, 2, "Unlisted", ""));
        assert!(!song.contaminated());
        assert!(!song.lyrics_available);
        assert!(song.metrics.is_none());
        assert_eq!(tokens, SongTokens::default());
        assert_eq!(song.genre, Genre::Pop);
    }

    #[test]
    fn test_annotation_only_lyrics_count_as_missing() {
        for lyrics in ["[Instrumental]", "(instrumental)", "[Intro]\n(x2)"] {
            let (song, tokens) = analyzer().annotate(raw(1975, 4, "Unlisted", lyrics));
            assert!(!song.lyrics_available, "{:?}", lyrics);
            assert!(song.metrics.is_none());
            assert_eq!(song.exclusion(), Some(ExclusionReason::MissingLyrics));
            assert_eq!(tokens, SongTokens::default());
        }
    }

    #[test]
    fn test_instrumental_song_does_not_shift_means() {
        let happy = "I love you baby you make me so happy tonight";
        let mut stats = RunStats::default();
        let alone = analyzer().run(vec![raw(1975, 1, "Unlisted", happy)], &mut stats);
        let with_instrumental = analyzer().run(
            vec![
                raw(1975, 1, "Unlisted", happy),
                raw(1975, 2, "Unlisted", "[Instrumental]"),
            ],
            &mut RunStats::default(),
        );
        let before = &alone.aggregations.by_year["1975"];
        let after = &with_instrumental.aggregations.by_year["1975"];
        assert_eq!(after.count, 2);
        assert_eq!(after.clean_count, 1);
        assert_eq!(after.avg_sentiment, before.avg_sentiment);
        assert_eq!(after.avg_word_count, before.avg_word_count);
    }

    #[test]
    fn test_contaminated_song_has_no_metrics() {
        let lyrics = "Madame de Villeparisis spoke of the Guermantes way";
        let (song, tokens) = analyzer().annotate(raw(1975, 3, "Unlisted", lyrics));
        assert!(song.contaminated());
        assert!(song.metrics.is_none());
        assert!(tokens.keywords.is_empty());
    }

    #[test]
    fn test_run_records_stats() {
        let raws = vec![
            raw(1965, 1, "The Beatles", "help me if you can I'm feeling down"),
            raw(1965, 2, "Unlisted", ""),
            raw(1966, 1, "Unlisted", &"word ".repeat(6000)),
        ];
        let mut stats = RunStats::default();
        let analysis = analyzer().run(raws, &mut stats);
        assert_eq!(analysis.songs.len(), 3);
        assert_eq!(stats.total_songs, 3);
        assert_eq!(stats.missing_lyrics, 1);
        assert_eq!(stats.contaminated, 1);
        assert_eq!(stats.contaminated_over_length, 1);
        let ids: Vec<&str> = analysis.songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1965_001", "1965_002", "1966_001"]);
    }
}
