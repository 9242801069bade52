//! Report which songs the contamination detector flags, and why.
//!
//! Runs only the detector over the chart CSV so thresholds and markers can
//! be tuned from a config file without a full analysis run.
//!
//! Usage: audit-contamination <songs.csv> [--config analysis.toml] [--reference reference.toml]

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use lyrics_analyze::config::{AnalysisConfig, YearRange};
use lyrics_analyze::contamination::ContaminationDetector;
use lyrics_analyze::ingest::load_songs;
use lyrics_analyze::metrics::word_count;
use lyrics_analyze::models::{ContaminationSignals, RunStats};
use lyrics_analyze::progress::format_duration;
use lyrics_analyze::reference::ReferenceTables;

/// Upper bounds of the word-count histogram buckets; the last bucket is open.
const BUCKETS: [usize; 7] = [100, 250, 500, 1000, 2500, 5000, 10_000];

#[derive(Parser)]
#[command(name = "audit-contamination")]
#[command(about = "List songs whose lyrics field holds non-lyric text")]
struct Args {
    source: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    reference: Option<PathBuf>,

    #[arg(long)]
    years: Option<YearRange>,

    /// Print at most this many flagged songs
    #[arg(long, default_value = "50")]
    limit: usize,
}

struct Flagged {
    id: String,
    title: String,
    artist: String,
    words: usize,
    signals: ContaminationSignals,
}

fn bucket_of(words: usize) -> usize {
    BUCKETS
        .iter()
        .position(|&upper| words < upper)
        .unwrap_or(BUCKETS.len())
}

fn bucket_label(i: usize) -> String {
    match i {
        0 => format!("< {}", BUCKETS[0]),
        i if i == BUCKETS.len() => format!(">= {}", BUCKETS[BUCKETS.len() - 1]),
        i => format!("{}-{}", BUCKETS[i - 1], BUCKETS[i] - 1),
    }
}

fn describe(signals: &ContaminationSignals) -> String {
    let mut parts = Vec::new();
    if signals.over_length {
        parts.push("over length".to_string());
    }
    if !signals.markers.is_empty() {
        parts.push(format!("markers: {}", signals.markers.join(", ")));
    }
    if signals.unbroken_block {
        parts.push("unbroken block".to_string());
    }
    parts.join("; ")
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let start = Instant::now();

    let mut config = AnalysisConfig::load(args.config.as_deref())
        .context("Failed to load analysis config")?;
    if let Some(years) = args.years {
        config.years = years;
    }
    let tables = ReferenceTables::load(args.reference.as_deref())
        .context("Failed to load reference tables")?;
    let detector = ContaminationDetector::new(&tables.contamination_markers, &config.contamination)
        .context("Failed to build contamination detector")?;

    println!("Loading songs from {:?}...", args.source);
    let mut stats = RunStats::default();
    let songs = load_songs(&args.source, &config.years, &mut stats)
        .with_context(|| format!("Failed to read {}", args.source.display()))?;
    println!("  Loaded {} songs", songs.len());

    let histogram: Vec<AtomicUsize> = (0..=BUCKETS.len()).map(|_| AtomicUsize::new(0)).collect();
    let over_length = AtomicUsize::new(0);
    let marker = AtomicUsize::new(0);
    let block = AtomicUsize::new(0);
    let with_lyrics = AtomicUsize::new(0);

    let flagged: Vec<Flagged> = songs
        .par_iter()
        .filter(|song| song.has_lyrics())
        .filter_map(|song| {
            with_lyrics.fetch_add(1, Ordering::Relaxed);
            let words = word_count(&song.lyrics);
            histogram[bucket_of(words)].fetch_add(1, Ordering::Relaxed);

            let signals = detector.detect(&song.lyrics, words)?;
            if signals.over_length {
                over_length.fetch_add(1, Ordering::Relaxed);
            }
            if !signals.markers.is_empty() {
                marker.fetch_add(1, Ordering::Relaxed);
            }
            if signals.unbroken_block {
                block.fetch_add(1, Ordering::Relaxed);
            }
            Some(Flagged {
                id: song.id.to_string(),
                title: song.title.clone(),
                artist: song.artist.clone(),
                words,
                signals,
            })
        })
        .collect();

    let total = with_lyrics.load(Ordering::Relaxed);
    let pct = |n: usize| {
        if total == 0 {
            0.0
        } else {
            100.0 * n as f64 / total as f64
        }
    };

    println!("\n=== FLAGGED SONGS ({} of {} with lyrics) ===", flagged.len(), total);
    println!();
    for song in flagged.iter().take(args.limit) {
        println!(
            "  {}  {} - {} ({} words): {}",
            song.id,
            song.artist,
            song.title,
            song.words,
            describe(&song.signals)
        );
    }
    if flagged.len() > args.limit {
        println!("  ... {} more", flagged.len() - args.limit);
    }

    println!("\n=== SIGNALS ===");
    println!();
    let ol = over_length.load(Ordering::Relaxed);
    let mk = marker.load(Ordering::Relaxed);
    let bl = block.load(Ordering::Relaxed);
    println!(
        "  Over {} words:  {:>6} ({:.2}%)",
        detector.max_word_count(),
        ol,
        pct(ol)
    );
    println!("  Marker match:     {:>6} ({:.2}%)", mk, pct(mk));
    println!("  Unbroken block:   {:>6} ({:.2}%)", bl, pct(bl));

    println!("\n=== WORD COUNT HISTOGRAM ===");
    println!();
    for (i, count) in histogram.iter().enumerate() {
        let n = count.load(Ordering::Relaxed);
        println!("  {:>12}  {:>6} ({:.2}%)", bucket_label(i), n, pct(n));
    }

    println!("\nElapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
