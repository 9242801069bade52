//! Text normalization shared by every metric.
//!
//! Two token profiles come out of one normalizer: the metric profile feeds
//! lexical diversity and word frequencies, the keyword profile feeds TF-IDF.
//! Both are lazy iterators over the input; callers own any caching.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use unicode_normalization::UnicodeNormalization;

use crate::reference::ReferenceTables;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Lyrics cleanup patterns (applied in order).
static LYRICS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Section annotations: "[Verse 1]", "[Chorus: Artist]"
        Regex::new(r"\[.*?\]").unwrap(),
        // Parenthetical notes: "(x2)", "(Repeat)"
        Regex::new(r"\(.*?\)").unwrap(),
        Regex::new(r"https?://\S+").unwrap(),
        // Trailing embed counters left by lyric sites: "...42Embed"
        Regex::new(r"\d*Embed\s*$").unwrap(),
        Regex::new(r"EmbedShare URLCopyEmbedCopy").unwrap(),
    ]
});

/// Regex to collapse any whitespace run into a single space
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Separators between a primary artist and featured/collaborating artists,
/// checked in this order on a normalized name.
const ARTIST_SEPARATORS: [&str; 7] = [
    " feat ",
    " featuring ",
    " ft ",
    " & ",
    " and ",
    " with ",
    " x ",
];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lower-case ASCII by applying NFKD decomposition and
/// removing combining marks, then transliterating whatever is left.
/// e.g., "Beyoncé" → "beyonce", "naïve" → "naive"
pub fn fold_to_ascii(s: &str) -> String {
    if s.is_ascii() {
        return s.to_ascii_lowercase();
    }
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Convert curly quotes and stray accents to straight quotes.
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
}

/// Strip section annotations, parenthetical notes, URLs and embed markers,
/// then collapse whitespace. Case and punctuation are preserved.
pub fn clean_lyrics(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let mut result = text.to_string();
    for pattern in LYRICS_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }
    WHITESPACE.replace_all(&result, " ").trim().to_string()
}

/// Fold one whitespace-delimited word to its bare lower-case form:
/// quotes normalized, diacritics folded, ASCII punctuation removed.
fn base_token(word: &str) -> String {
    let folded = if word.is_ascii() {
        word.to_ascii_lowercase()
    } else {
        fold_to_ascii(&normalize_punctuation(word))
    };
    folded
        .chars()
        .filter(|c| !c.is_ascii_punctuation() && !c.is_whitespace())
        .collect()
}

/// Normalize an artist name for table lookups.
/// e.g., "Guns N' Roses" → "guns n roses", "T.I." → "ti", "Jay-Z" → "jay z"
pub fn normalize_name(name: &str) -> String {
    let folded = fold_to_ascii(&normalize_punctuation(name));
    let cleaned: String = folded
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '.'))
        .map(|c| if c == '-' { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Primary artist of a normalized credit: the part before the first
/// featuring/collaboration separator, or the whole credit.
/// e.g., "drake feat rihanna" → "drake", "hall and oates" → "hall"
pub fn primary_artist(normalized: &str) -> &str {
    for sep in ARTIST_SEPARATORS {
        if let Some(idx) = normalized.find(sep) {
            let head = normalized[..idx].trim();
            if !head.is_empty() {
                return head;
            }
        }
    }
    normalized
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Tokenizer with the stopword sets of one reference table version.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stopwords: FxHashSet<String>,
    /// Metric stopwords plus the extended keyword list.
    keyword_stopwords: FxHashSet<String>,
    min_keyword_len: usize,
}

impl Normalizer {
    pub fn new(tables: &ReferenceTables, min_keyword_len: usize) -> Self {
        let stopwords: FxHashSet<String> =
            tables.stopwords.iter().map(|w| base_token(w)).collect();
        let keyword_stopwords = stopwords
            .iter()
            .cloned()
            .chain(tables.keyword_stopwords.iter().map(|w| base_token(w)))
            .collect();
        Self {
            stopwords,
            keyword_stopwords,
            min_keyword_len,
        }
    }

    /// Metric profile: lower-cased, punctuation-stripped tokens of at least
    /// two characters, without stopwords or pure numbers.
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.split_whitespace()
            .map(base_token)
            .filter(move |t| {
                t.len() >= 2
                    && !t.bytes().all(|b| b.is_ascii_digit())
                    && !self.stopwords.contains(t)
            })
    }

    /// Keyword profile: ASCII-alphabetic tokens of at least `min_keyword_len`
    /// characters, filtered against the extended stopword list.
    pub fn keyword_tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.split_whitespace()
            .map(base_token)
            .filter(move |t| {
                t.len() >= self.min_keyword_len
                    && t.bytes().all(|b| b.is_ascii_lowercase())
                    && !self.keyword_stopwords.contains(t)
            })
    }

    /// Tokenize one song's cleaned text into both profiles.
    pub fn song_tokens(&self, cleaned: &str) -> SongTokens {
        SongTokens {
            metric: self.tokens(cleaned).collect(),
            keywords: self.keyword_tokens(cleaned).collect(),
        }
    }
}

/// Cached token streams of one song, shared by the metric, frequency and
/// TF-IDF stages so each song is tokenized once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongTokens {
    pub metric: Vec<String>,
    pub keywords: Vec<String>,
}

// ============================================================================
// TESTS
// ============================================================================
