//! The report artifact and the per-partition lyrics files.
//!
//! Every file is written to a temporary sibling and renamed over the
//! target, so a failed run leaves the previous artifact untouched.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

use crate::aggregate::Aggregations;
use crate::error::{Error, Result};
use crate::frequency::WordFrequencies;
use crate::models::{
    decade_key, ContaminationSignals, ExclusionReason, Genre, SentimentScores, Song, SongId,
};
use crate::pipeline::Analysis;
use crate::tfidf::TfidfTables;

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub total_songs: usize,
    pub songs_with_lyrics: usize,
    /// Clean, lyric-bearing songs: the ones behind every mean and keyword.
    pub analyzed_songs: usize,
    pub contaminated: usize,
    pub missing_lyrics: usize,
    /// `[first, last]`, empty for an empty corpus.
    pub years_covered: Vec<u16>,
    /// Genres present, in taxonomy order.
    pub genres: Vec<Genre>,
    pub genre_labels: BTreeMap<Genre, &'static str>,
    pub source: String,
    pub reference_version: String,
}

/// One entry of the `songs` section. Lyrics are not included; they live in
/// the lyrics files.
#[derive(Debug, Serialize)]
pub struct SongRecord<'a> {
    pub id: &'a SongId,
    pub year: u16,
    pub rank: Option<u16>,
    pub title: &'a str,
    pub artist: &'a str,
    pub album: Option<&'a str>,
    pub spotify_id: Option<&'a str>,
    pub genre: Genre,
    pub genre_label: &'static str,
    pub decade: String,
    pub lyrics_available: bool,
    pub contaminated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contamination: Option<&'a ContaminationSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<ExclusionReason>,
    pub word_count: Option<usize>,
    pub sentiment: Option<SentimentScores>,
    pub lexical_diversity: Option<f64>,
}

impl<'a> SongRecord<'a> {
    pub fn from_song(song: &'a Song) -> Self {
        Self {
            id: &song.id,
            year: song.year,
            rank: song.rank,
            title: &song.title,
            artist: &song.artist,
            album: song.album.as_deref(),
            spotify_id: song.spotify_id.as_deref(),
            genre: song.genre,
            genre_label: song.genre.label(),
            decade: decade_key(song.decade()),
            lyrics_available: song.lyrics_available,
            contaminated: song.contaminated(),
            contamination: song.contamination.as_ref(),
            excluded: song.exclusion(),
            word_count: song.metrics.as_ref().map(|m| m.word_count),
            sentiment: song.metrics.as_ref().map(|m| m.sentiment),
            lexical_diversity: song.metrics.as_ref().and_then(|m| m.lexical_diversity),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub metadata: Metadata,
    pub songs: Vec<SongRecord<'a>>,
    pub aggregations: &'a Aggregations,
    pub word_frequencies: &'a WordFrequencies,
    pub tfidf: &'a TfidfTables,
}

impl<'a> Report<'a> {
    /// `source` is a display name for the input, not a filesystem path, so
    /// the report does not depend on where the run happened.
    pub fn new(analysis: &'a Analysis, source: &str) -> Self {
        let songs = &analysis.songs;
        let years_covered = match (
            songs.iter().map(|s| s.year).min(),
            songs.iter().map(|s| s.year).max(),
        ) {
            (Some(first), Some(last)) => vec![first, last],
            _ => Vec::new(),
        };
        let genres: Vec<Genre> = Genre::ALL
            .into_iter()
            .filter(|g| songs.iter().any(|s| s.genre == *g))
            .collect();

        let metadata = Metadata {
            total_songs: songs.len(),
            songs_with_lyrics: songs.iter().filter(|s| s.lyrics_available).count(),
            analyzed_songs: songs.iter().filter(|s| s.is_analyzable()).count(),
            contaminated: songs.iter().filter(|s| s.contaminated()).count(),
            missing_lyrics: songs.iter().filter(|s| !s.lyrics_available).count(),
            years_covered,
            genre_labels: genres.iter().map(|g| (*g, g.label())).collect(),
            genres,
            source: source.to_string(),
            reference_version: analysis.reference_version.clone(),
        };

        Self {
            metadata,
            songs: songs.iter().map(SongRecord::from_song).collect(),
            aggregations: &analysis.aggregations,
            word_frequencies: &analysis.word_frequencies,
            tfidf: &analysis.tfidf,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Serialize `value` as pretty JSON into a temporary file next to `path`,
/// then atomically rename it over `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let tmp = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n").map_err(|e| Error::io(tmp.path(), e))?;
        writer.flush().map_err(|e| Error::io(tmp.path(), e))?;
    }
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|source| Error::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// One entry of a lyrics file.
#[derive(Debug, Serialize)]
struct LyricsEntry<'a> {
    title: &'a str,
    artist: &'a str,
    year: u16,
    rank: Option<u16>,
    genre: Genre,
    genre_label: &'static str,
    lyrics: &'a str,
}

type LyricsFile<'a> = BTreeMap<&'a SongId, LyricsEntry<'a>>;

/// Write `by_decade/<decade>.json`, `by_year/<year>.json` and
/// `by_genre/<genre>.json` under `dir`. Contaminated and lyric-less songs
/// are never written. Returns the number of files written.
///
/// The tree is rebuilt from scratch in a staging directory beside `dir` and
/// swapped in at the end, so files from an earlier run never survive and a
/// failed run leaves the previous tree in place.
pub fn write_lyrics_files(dir: &Path, songs: &[Song]) -> Result<usize> {
    let mut by_decade: BTreeMap<String, LyricsFile> = BTreeMap::new();
    let mut by_year: BTreeMap<String, LyricsFile> = BTreeMap::new();
    let mut by_genre: BTreeMap<String, LyricsFile> = BTreeMap::new();

    for song in songs.iter().filter(|s| s.is_analyzable()) {
        let entry = || LyricsEntry {
            title: &song.title,
            artist: &song.artist,
            year: song.year,
            rank: song.rank,
            genre: song.genre,
            genre_label: song.genre.label(),
            lyrics: &song.raw_lyrics,
        };
        by_decade
            .entry(decade_key(song.decade()))
            .or_default()
            .insert(&song.id, entry());
        by_year
            .entry(song.year.to_string())
            .or_default()
            .insert(&song.id, entry());
        by_genre
            .entry(song.genre.code().to_string())
            .or_default()
            .insert(&song.id, entry());
    }

    let parent = parent_dir(dir);
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    let staging = tempfile::Builder::new()
        .prefix(".lyrics-staging-")
        .tempdir_in(parent)
        .map_err(|e| Error::io(parent, e))?;

    let mut written = 0;
    for (subdir, files) in [("by_decade", by_decade), ("by_year", by_year), ("by_genre", by_genre)] {
        let target = staging.path().join(subdir);
        std::fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        for (name, entries) in files {
            write_json_atomic(&target.join(format!("{}.json", name)), &entries)?;
            written += 1;
        }
    }

    replace_dir(staging, dir)?;
    tracing::debug!("Wrote {} lyrics files under {}", written, dir.display());
    Ok(written)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Move a fully written staging tree over `dir`. An existing `dir` is moved
/// aside first and restored if the swap fails.
fn replace_dir(staging: TempDir, dir: &Path) -> Result<()> {
    let parent = parent_dir(dir);
    let retired = tempfile::Builder::new()
        .prefix(".lyrics-retired-")
        .tempdir_in(parent)
        .map_err(|e| Error::io(parent, e))?;
    let old = retired.path().join("tree");

    let had_previous = dir.exists();
    if had_previous {
        std::fs::rename(dir, &old).map_err(|e| Error::io(dir, e))?;
    }
    if let Err(e) = std::fs::rename(staging.path(), dir) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&old, dir) {
                tracing::error!("Failed to restore {}: {}", dir.display(), restore);
            }
        }
        return Err(Error::io(dir, e));
    }
    // `retired` removes the previous tree when dropped
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::song;

    #[test]
    fn test_write_json_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "old").unwrap();
        write_json_atomic(&path, &BTreeMap::from([("a", 1)])).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}\n");
        // no temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_write_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "previous").unwrap();
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], 1);
        // map keys that are not strings fail to serialize
        assert!(write_json_atomic(&path, &bad).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
    }

    #[test]
    fn test_lyrics_files_skip_excluded_songs() {
        let dir = tempfile::tempdir().unwrap();
        let clean = song(1985, 1, Genre::Pop, Some(0.2));
        let missing = song(1985, 2, Genre::Pop, None);
        let mut dirty = song(1991, 1, Genre::Rock, Some(0.1));
        dirty.contamination = Some(Default::default());
        dirty.metrics = None;

        let written = write_lyrics_files(dir.path(), &[clean, missing, dirty]).unwrap();
        assert_eq!(written, 3);
        let decade = std::fs::read_to_string(dir.path().join("by_decade/1980s.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&decade).unwrap();
        assert!(parsed.get("1985_001").is_some());
        assert!(parsed.get("1985_002").is_none());
        assert!(!dir.path().join("by_decade/1990s.json").exists());
        assert!(!dir.path().join("by_genre/rock.json").exists());
    }

    #[test]
    fn test_rerun_drops_songs_that_became_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let lyrics_dir = dir.path().join("lyrics");
        let clean = song(1985, 1, Genre::Pop, Some(0.4));
        write_lyrics_files(&lyrics_dir, &[clean.clone()]).unwrap();
        assert!(lyrics_dir.join("by_year/1985.json").exists());

        let mut flagged = clean;
        flagged.contamination = Some(ContaminationSignals {
            markers: vec!["guermantes".into()],
            ..Default::default()
        });
        flagged.metrics = None;
        let other = song(1991, 1, Genre::Rock, Some(0.1));
        let written = write_lyrics_files(&lyrics_dir, &[flagged, other]).unwrap();

        assert_eq!(written, 3);
        assert!(!lyrics_dir.join("by_year/1985.json").exists());
        assert!(!lyrics_dir.join("by_decade/1980s.json").exists());
        assert!(!lyrics_dir.join("by_genre/pop.json").exists());
        assert!(lyrics_dir.join("by_year/1991.json").exists());
        // only the target directory is left beside the tempdir contents
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("lyrics")]);
    }
}
