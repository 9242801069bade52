//! End-to-end runs over a small chart CSV.

use std::path::Path;

use lyrics_analyze::config::AnalysisConfig;
use lyrics_analyze::ingest::load_songs;
use lyrics_analyze::models::{Genre, RunStats};
use lyrics_analyze::output::{write_json_atomic, write_lyrics_files, Report};
use lyrics_analyze::pipeline::{Analysis, Analyzer};

const ROWS: &[(&str, &str, &str, &str, &str)] = &[
    // rank, title, artist, year, lyrics
    ("1", "Hey Jude", "The Beatles", "1968", "Hey Jude don't make it bad\nTake a sad song and make it better\nRemember to let her into your heart\nThen you can start to make it better"),
    ("2", "Jolene", "Dolly Parton", "1974", "Jolene Jolene Jolene Jolene\nI'm begging of you please don't take my man\nYour beauty is beyond compare\nWith flaming locks of auburn hair"),
    ("3", "Like a Prayer", "Madonna", "1989", "Life is a mystery everyone must stand alone\nI hear you call my name and it feels like home\nWhen you call my name it's like a little prayer"),
    ("4", "Lose Yourself", "Eminem", "2002", "Look if you had one shot one opportunity\nTo seize everything you ever wanted in one moment\nWould you capture it or just let it slip"),
    ("5", "Mystery Track", "Unlisted Act", "1985", ""),
    ("6", "Swann's Way", "Unlisted Act", "1985", "Madame de Villeparisis spoke at length of the Guermantes way and of Swann"),
    ("7", "Billie Jean", "Michael Jackson", "1983", "Billie Jean is not my lover\nShe's just a girl who claims that I am the one\nBut the kid is not my son\nPeople always told me be careful what you do"),
    ("8", "Ring of Fire", "Johnny Cash", "1963", "Love is a burning thing\nAnd it makes a fiery ring\nBound by wild desire\nI fell into a ring of fire"),
];

fn write_csv(path: &Path, rows: &[(&str, &str, &str, &str, &str)]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer
        .write_record(["Rank", "Song Title", "Artist", "Year", "Lyrics", "Album", "Media"])
        .unwrap();
    for (rank, title, artist, year, lyrics) in rows {
        writer
            .write_record([*rank, *title, *artist, *year, *lyrics, "", "[]"])
            .unwrap();
    }
    writer.flush().unwrap();
}

fn analyze(path: &Path) -> (Analysis, RunStats) {
    let config = AnalysisConfig::default();
    let mut stats = RunStats::default();
    let raws = load_songs(path, &config.years, &mut stats).unwrap();
    let analyzer = Analyzer::with_defaults(&config).unwrap();
    let analysis = analyzer.run(raws, &mut stats);
    (analysis, stats)
}

fn corpus() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("songs.csv");
    write_csv(&source, ROWS);
    (dir, source)
}

#[test]
fn test_every_song_is_classified_and_counted() {
    let (_dir, source) = corpus();
    let (analysis, stats) = analyze(&source);

    assert_eq!(analysis.songs.len(), ROWS.len());
    assert_eq!(stats.missing_lyrics, 1);
    assert_eq!(stats.contaminated, 1);

    let by_genre: usize = analysis.aggregations.by_genre.values().map(|a| a.count).sum();
    let by_decade: usize = analysis.aggregations.by_decade.values().map(|a| a.count).sum();
    let by_year: usize = analysis.aggregations.by_year.values().map(|a| a.count).sum();
    assert_eq!(by_genre, ROWS.len());
    assert_eq!(by_decade, ROWS.len());
    assert_eq!(by_year, ROWS.len());

    let genre_of = |title: &str| {
        analysis
            .songs
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.genre)
            .unwrap()
    };
    assert_eq!(genre_of("Hey Jude"), Genre::Rock);
    assert_eq!(genre_of("Jolene"), Genre::Country);
    assert_eq!(genre_of("Lose Yourself"), Genre::Hiphop);
    // no artist match, no hint, no keyword: the era default decides
    assert_eq!(genre_of("Mystery Track"), Genre::Pop);
}

#[test]
fn test_excluded_songs_never_feed_metrics() {
    let (_dir, source) = corpus();
    let (analysis, _) = analyze(&source);

    for song in &analysis.songs {
        if !song.is_analyzable() {
            assert!(song.metrics.is_none(), "{} has metrics", song.id);
        }
    }
    let eighties = &analysis.aggregations.by_decade["1980s"];
    assert_eq!(eighties.count, 4);
    assert_eq!(eighties.contaminated, 1);
    assert_eq!(eighties.clean_count, 2);

    let keywords: Vec<&str> = analysis
        .tfidf
        .by_genre
        .values()
        .flatten()
        .map(|e| e.word.as_str())
        .collect();
    assert!(!keywords.contains(&"guermantes"));
    assert!(!keywords.contains(&"villeparisis"));
}

#[test]
fn test_tfidf_lists_are_sorted() {
    let (_dir, source) = corpus();
    let (analysis, _) = analyze(&source);

    assert!(!analysis.tfidf.by_genre.is_empty());
    for entries in analysis
        .tfidf
        .by_genre
        .values()
        .chain(analysis.tfidf.by_genre_decade.values())
    {
        assert!(entries.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(entries.iter().all(|e| e.score > 0.0));
    }
}

#[test]
fn test_report_is_byte_identical_across_runs() {
    let (dir, source) = corpus();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    for output in [&first, &second] {
        let (analysis, _) = analyze(&source);
        let report = Report::new(&analysis, "songs.csv");
        write_json_atomic(output, &report).unwrap();
    }

    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn test_report_metadata_and_song_records() {
    let (_dir, source) = corpus();
    let (analysis, _) = analyze(&source);
    let report = Report::new(&analysis, "songs.csv");
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    let metadata = &json["metadata"];
    assert_eq!(metadata["total_songs"], 8);
    assert_eq!(metadata["songs_with_lyrics"], 7);
    assert_eq!(metadata["analyzed_songs"], 6);
    assert_eq!(metadata["years_covered"], serde_json::json!([1963, 2002]));
    assert_eq!(metadata["source"], "songs.csv");

    let songs = json["songs"].as_array().unwrap();
    let ids: Vec<&str> = songs.iter().map(|s| s["id"].as_str().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let swann = songs.iter().find(|s| s["title"] == "Swann's Way").unwrap();
    assert_eq!(swann["contaminated"], true);
    assert_eq!(swann["excluded"], "contaminated");
    assert!(swann["sentiment"].is_null());

    let mystery = songs.iter().find(|s| s["title"] == "Mystery Track").unwrap();
    assert_eq!(mystery["contaminated"], false);
    assert_eq!(mystery["excluded"], "missing_lyrics");
}

#[test]
fn test_lyrics_files_exclude_contaminated_songs() {
    let (dir, source) = corpus();
    let (analysis, _) = analyze(&source);
    let lyrics_dir = dir.path().join("lyrics");
    write_lyrics_files(&lyrics_dir, &analysis.songs).unwrap();

    let text = std::fs::read_to_string(lyrics_dir.join("by_year/1985.json"));
    // both 1985 songs are excluded, so there is no file for that year
    assert!(text.is_err());

    let eighties = std::fs::read_to_string(lyrics_dir.join("by_decade/1980s.json")).unwrap();
    assert!(!eighties.contains("Guermantes"));
    assert!(eighties.contains("Billie Jean"));
}

#[test]
fn test_empty_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty.csv");
    write_csv(&source, &[]);
    let (analysis, stats) = analyze(&source);

    assert!(analysis.songs.is_empty());
    assert_eq!(stats.total_songs, 0);
    assert!(analysis.aggregations.by_year.is_empty());
    assert!(analysis.tfidf.by_genre.is_empty());
    let report = Report::new(&analysis, "empty.csv");
    assert!(report.metadata.years_covered.is_empty());
}
