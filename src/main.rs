use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;

use lyrics_analyze::config::{AnalysisConfig, YearRange};
use lyrics_analyze::events::EventsFile;
use lyrics_analyze::ingest::load_songs;
use lyrics_analyze::models::RunStats;
use lyrics_analyze::output::{write_json_atomic, write_lyrics_files, Report};
use lyrics_analyze::pipeline::Analyzer;
use lyrics_analyze::progress::{format_duration, set_log_only};
use lyrics_analyze::reference::ReferenceTables;
use lyrics_analyze::safety::{validate_lyrics_dir, validate_output_path};
use lyrics_analyze::sentiment::SentimentTables;

#[derive(Parser)]
#[command(name = "lyrics-analyze")]
#[command(about = "Analyze chart lyrics into the dashboard data artifact")]
struct Args {
    /// Chart CSV (Rank, Song Title, Artist, Year, Lyrics, Album, Media)
    source: PathBuf,

    /// Report to write (.json); replaced atomically
    output: PathBuf,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Only analyze these years, e.g. 1980-1989
    #[arg(long)]
    years: Option<YearRange>,

    /// Analysis thresholds (TOML); defaults apply to anything omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference tables (TOML) replacing the embedded ones
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Sentiment lexicon and modifiers (TOML) replacing the embedded ones
    #[arg(long)]
    sentiment: Option<PathBuf>,

    /// Also write per-decade, per-year and per-genre lyrics files here.
    /// The directory is rebuilt on every run.
    #[arg(long)]
    lyrics_dir: Option<PathBuf>,

    /// Validate an events.json against the analyzed years
    #[arg(long)]
    events: Option<PathBuf>,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Log progress lines instead of progress bars (for piped output)
    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    validate_output_path(&args.output, "json", &[args.source.as_path()])?;
    if let Some(dir) = &args.lyrics_dir {
        let mut protected = vec![args.source.as_path(), args.output.as_path()];
        protected.extend(
            [&args.config, &args.reference, &args.sentiment, &args.events, &args.stats]
                .into_iter()
                .flatten()
                .map(PathBuf::as_path),
        );
        validate_lyrics_dir(dir, &protected)?;
    }

    let start = Instant::now();

    let mut config = AnalysisConfig::load(args.config.as_deref())
        .context("Failed to load analysis config")?;
    if let Some(years) = &args.years {
        config.years = match config.years.intersect(years) {
            Some(range) => range,
            None => bail!(
                "--years {}-{} does not overlap the configured range {}-{}",
                years.start,
                years.end,
                config.years.start,
                config.years.end
            ),
        };
    }

    let tables = ReferenceTables::load(args.reference.as_deref())
        .context("Failed to load reference tables")?;
    let sentiment = SentimentTables::load(args.sentiment.as_deref())
        .context("Failed to load sentiment tables")?;
    let analyzer = Analyzer::new(&config, &tables, &sentiment)?;
    tracing::info!(
        "Reference tables version {}, years {}-{}",
        tables.version,
        config.years.start,
        config.years.end
    );

    let mut stats = RunStats::default();
    tracing::info!("Reading source CSV: {:?}", args.source);
    let raws = load_songs(&args.source, &config.years, &mut stats)
        .with_context(|| format!("Failed to read {}", args.source.display()))?;
    tracing::info!(
        "Loaded {} songs from {} records ({} rejected)",
        raws.len(),
        stats.records_read,
        stats.rejected()
    );

    let analysis = analyzer.run(raws, &mut stats);

    let report = Report::new(&analysis, &source_name(&args.source));
    write_json_atomic(&args.output, &report)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!("Wrote report: {:?}", args.output);

    if let Some(dir) = &args.lyrics_dir {
        let files = write_lyrics_files(dir, &analysis.songs)
            .with_context(|| format!("Failed to write lyrics files under {}", dir.display()))?;
        tracing::info!("Wrote {} lyrics files under {:?}", files, dir);
    }

    if let Some(path) = &args.events {
        let events = EventsFile::load(path)
            .with_context(|| format!("Failed to read events file {}", path.display()))?;
        let covered = match report.metadata.years_covered.as_slice() {
            [first, last] => Some((*first, *last)),
            _ => None,
        };
        let issues = events.validate(covered);
        for issue in &issues {
            tracing::warn!("{}: {}", path.display(), issue);
        }
        tracing::info!("Checked {} events, {} issues", events.events.len(), issues.len());
    }

    let elapsed = start.elapsed();
    stats.elapsed_seconds = elapsed.as_secs_f64();
    stats.log_phase("final");
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    }

    let metadata = &report.metadata;
    println!("\n{:=<60}", "");
    println!("Analysis complete!");
    println!("  Songs: {}", metadata.total_songs);
    println!("  With lyrics: {}", metadata.songs_with_lyrics);
    println!("  Analyzed: {}", metadata.analyzed_songs);
    println!(
        "  Contaminated: {} ({:.2}%)",
        metadata.contaminated,
        stats.contamination_rate()
    );
    println!("  Genres: {}", metadata.genres.len());
    println!("  Elapsed: {}", format_duration(elapsed));
    println!("{:=<60}", "");

    Ok(())
}

/// File name of the source, so the report does not embed local paths.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
