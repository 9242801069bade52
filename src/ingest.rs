//! CSV ingestion adapter.
//!
//! Reads the chart dataset (`Rank`, `Song Title`, `Artist`, `Year`,
//! `Lyrics`, `Album`, `Media`, optional `Genre`) into `RawSong`s. A bad row
//! never aborts the run: it is logged with its line number, counted in
//! `RunStats` and skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::config::YearRange;
use crate::error::{Error, Result};
use crate::models::{RawSong, RunStats, SongId};

/// Spotify track id inside the `Media` column, either as a URI or a URL.
static SPOTIFY_TRACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:spotify:track:|open\.spotify\.com/track/)([A-Za-z0-9]+)").unwrap()
});

#[derive(Debug, Deserialize)]
struct ChartRecord {
    #[serde(rename = "Rank", default)]
    rank: Option<String>,
    #[serde(rename = "Song Title", default)]
    title: String,
    #[serde(rename = "Artist", default)]
    artist: String,
    #[serde(rename = "Year", default)]
    year: Option<String>,
    #[serde(rename = "Lyrics", default)]
    lyrics: String,
    #[serde(rename = "Album", default)]
    album: Option<String>,
    #[serde(rename = "Genre", default)]
    genre: Option<String>,
    #[serde(rename = "Media", default)]
    media: Option<String>,
}

/// Why a record was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    Year(String),
    Rank(String),
}

pub fn load_songs(path: &Path, years: &YearRange, stats: &mut RunStats) -> Result<Vec<RawSong>> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    read_songs(file, years, stats)
}

/// Read, validate and identify songs. The result is sorted by id.
pub fn read_songs<R: Read>(source: R, years: &YearRange, stats: &mut RunStats) -> Result<Vec<RawSong>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
    let headers = reader.headers()?.clone();

    let mut songs = Vec::new();
    let mut seen: FxHashMap<SongId, usize> = FxHashMap::default();
    let mut record = csv::StringRecord::new();

    loop {
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(e) => {
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    return Err(e.into());
                }
                stats.records_read += 1;
                stats.rejected_unreadable += 1;
                tracing::warn!("Skipping unreadable CSV record: {}", e);
                continue;
            }
        }
        stats.records_read += 1;
        let line = record.position().map_or(0, |p| p.line());

        let row: ChartRecord = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                stats.rejected_unreadable += 1;
                tracing::warn!("Skipping CSV line {}: {}", line, e);
                continue;
            }
        };

        let (year, rank) = match parse_fields(&row) {
            Ok(fields) => fields,
            Err(rejection) => {
                let reason = match &rejection {
                    Rejection::Year(raw) => {
                        stats.rejected_year += 1;
                        format!("malformed year '{}'", raw)
                    }
                    Rejection::Rank(raw) => {
                        stats.rejected_rank += 1;
                        format!("malformed rank '{}'", raw)
                    }
                };
                tracing::warn!(
                    "Skipping CSV line {} ('{}' by '{}'): {}",
                    line,
                    row.title.trim(),
                    row.artist.trim(),
                    reason
                );
                continue;
            }
        };

        if !years.contains(year) {
            stats.outside_year_range += 1;
            tracing::debug!("Skipping CSV line {}: year {} outside {}-{}", line, year, years.start, years.end);
            continue;
        }

        let base = SongId::new(year, rank);
        let n = seen.entry(base.clone()).or_insert(0);
        *n += 1;
        let id = if *n == 1 {
            base
        } else {
            stats.duplicate_ids += 1;
            let id = base.with_suffix(*n);
            tracing::debug!("CSV line {}: repeated id {}, using {}", line, base, id);
            id
        };

        songs.push(RawSong {
            id,
            title: row.title.trim().to_string(),
            artist: row.artist.trim().to_string(),
            year,
            rank,
            album: non_empty(row.album),
            genre_hint: non_empty(row.genre),
            spotify_id: row.media.as_deref().and_then(extract_spotify_id),
            lyrics: row.lyrics.trim().to_string(),
        });
    }

    if stats.outside_year_range > 0 {
        tracing::info!(
            "Skipped {} records outside {}-{}",
            stats.outside_year_range,
            years.start,
            years.end
        );
    }

    songs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(songs)
}

fn parse_fields(row: &ChartRecord) -> std::result::Result<(u16, Option<u16>), Rejection> {
    let raw_year = row.year.as_deref().unwrap_or("").trim();
    let year = parse_number(raw_year).ok_or_else(|| Rejection::Year(raw_year.to_string()))?;

    let raw_rank = row.rank.as_deref().unwrap_or("").trim();
    let rank = if raw_rank.is_empty() {
        None
    } else {
        Some(parse_number(raw_rank).ok_or_else(|| Rejection::Rank(raw_rank.to_string()))?)
    };
    Ok((year, rank))
}

/// Whole numbers, also in the "1985.0" form spreadsheets export.
fn parse_number(raw: &str) -> Option<u16> {
    if let Ok(n) = raw.parse::<u16>() {
        return Some(n);
    }
    let f: f64 = raw.parse().ok()?;
    (f.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(&f)).then(|| f as u16)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Spotify track id from the `Media` column, if it links one.
pub fn extract_spotify_id(media: &str) -> Option<String> {
    SPOTIFY_TRACK
        .captures(media)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
