//! Rule-based genre classification.
//!
//! Rules are tried in a fixed order and the first one that fires decides:
//!
//! 1. explicit overrides (exact artist match)
//! 2. artist tables against the primary artist, in `genre_priority` order
//! 3. artist tables against the full credit, in `genre_priority` order
//! 4. the source genre hint, when it names a taxonomy genre
//! 5. whole-word title keywords, in taxonomy order
//! 6. the era default for the song's year
//! 7. `other`
//!
//! The function is total: every input maps to exactly one genre.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::models::Genre;
use crate::normalize::{normalize_name, primary_artist};
use crate::reference::{Era, ReferenceTables};

/// Known names up to this length only match as whole words
/// ("eve", "pink", "u2", "ti").
const SHORT_NAME_LEN: usize = 4;

/// Which rule decided a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenreRule {
    Override,
    PrimaryArtist,
    FullCredit,
    Hint,
    TitleKeyword,
    Era,
    Fallback,
}

#[derive(Debug, Clone)]
struct KnownArtist {
    name: String,
    whole_word: bool,
}

impl KnownArtist {
    fn new(raw: &str) -> Self {
        let name = normalize_name(raw);
        let whole_word = name.len() <= SHORT_NAME_LEN;
        Self { name, whole_word }
    }

    fn matches(&self, artist: &str) -> bool {
        if self.whole_word {
            contains_word(artist, &self.name)
        } else {
            artist.contains(self.name.as_str())
        }
    }
}

pub struct GenreClassifier {
    overrides: FxHashMap<String, Genre>,
    artists: Vec<(Genre, Vec<KnownArtist>)>,
    keywords: Vec<(Genre, Vec<String>)>,
    eras: Vec<Era>,
}

impl GenreClassifier {
    pub fn from_reference(tables: &ReferenceTables) -> Result<Self> {
        let overrides = tables
            .override_table()?
            .into_iter()
            .map(|(artist, genre)| (normalize_name(artist), genre))
            .collect();
        let artists = tables
            .artist_tables()?
            .into_iter()
            .map(|(genre, names)| {
                let known = names
                    .iter()
                    .map(|n| KnownArtist::new(n))
                    .filter(|k| !k.name.is_empty())
                    .collect();
                (genre, known)
            })
            .collect();
        let keywords = tables
            .keyword_table()?
            .into_iter()
            .map(|(genre, words)| (genre, words.iter().map(|w| w.to_lowercase()).collect()))
            .collect();
        Ok(Self {
            overrides,
            artists,
            keywords,
            eras: tables.era_table()?,
        })
    }

    pub fn classify(&self, artist: &str, title: &str, year: u16, hint: Option<&str>) -> Genre {
        self.classify_with_rule(artist, title, year, hint).0
    }

    /// Classification plus the rule that produced it, for auditing.
    pub fn classify_with_rule(
        &self,
        artist: &str,
        title: &str,
        year: u16,
        hint: Option<&str>,
    ) -> (Genre, GenreRule) {
        let credit = normalize_name(artist);
        let primary = primary_artist(&credit);

        if let Some(genre) = self
            .overrides
            .get(primary)
            .or_else(|| self.overrides.get(credit.as_str()))
        {
            return (*genre, GenreRule::Override);
        }

        if !primary.is_empty() {
            if let Some(genre) = self.match_artist(primary) {
                return (genre, GenreRule::PrimaryArtist);
            }
        }
        if !credit.is_empty() && credit != primary {
            if let Some(genre) = self.match_artist(&credit) {
                return (genre, GenreRule::FullCredit);
            }
        }

        if let Some(genre) = hint
            .and_then(|h| h.parse::<Genre>().ok())
            .filter(|g| *g != Genre::Other)
        {
            return (genre, GenreRule::Hint);
        }

        let title = title.to_lowercase();
        for (genre, words) in &self.keywords {
            if words.iter().any(|w| contains_word(&title, w)) {
                return (*genre, GenreRule::TitleKeyword);
            }
        }

        if let Some(era) = self.eras.iter().find(|e| (e.start..=e.end).contains(&year)) {
            return (era.genre, GenreRule::Era);
        }

        (Genre::Other, GenreRule::Fallback)
    }

    fn match_artist(&self, artist: &str) -> Option<Genre> {
        self.artists
            .iter()
            .find(|(_, known)| known.iter().any(|k| k.matches(artist)))
            .map(|(genre, _)| *genre)
    }
}

/// Whole-word containment: every occurrence of `needle` is checked for
/// alphanumeric neighbours on either side.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> GenreClassifier {
        GenreClassifier::from_reference(&ReferenceTables::embedded().unwrap()).unwrap()
    }

    #[test]
    fn test_known_artists() {
        let c = classifier();
        assert_eq!(c.classify("The Beatles", "Help!", 1965, None), Genre::Rock);
        assert_eq!(c.classify("Eminem", "Lose Yourself", 2002, None), Genre::Hiphop);
        assert_eq!(c.classify("Toni Braxton", "Un-Break My Heart", 1996, None), Genre::Rnb);
        assert_eq!(c.classify("Beyoncé", "Halo", 2009, None), c.classify("beyonce", "Halo", 2009, None));
    }

    #[test]
    fn test_override_beats_tables() {
        let c = classifier();
        assert_eq!(
            c.classify_with_rule("Taylor Swift", "Shake It Off", 2014, Some("country")),
            (Genre::Pop, GenreRule::Override)
        );
    }

    #[test]
    fn test_primary_artist_wins_over_featured() {
        let c = classifier();
        let (genre, rule) = c.classify_with_rule("Eminem feat. Rihanna", "Love the Way You Lie", 2010, None);
        assert_eq!(genre, Genre::Hiphop);
        assert_eq!(rule, GenreRule::PrimaryArtist);
    }

    #[test]
    fn test_full_credit_fallback() {
        let c = classifier();
        let (genre, rule) = c.classify_with_rule("Nobody Famous feat. Eminem", "Song", 2005, None);
        assert_eq!(genre, Genre::Hiphop);
        assert_eq!(rule, GenreRule::FullCredit);
    }

    #[test]
    fn test_short_names_need_whole_words() {
        let c = classifier();
        // "u2" must not match inside an unrelated token
        let (_, rule) = c.classify_with_rule("Xu2x Collective", "Plain Song", 1985, None);
        assert_ne!(rule, GenreRule::PrimaryArtist);
        assert_eq!(c.classify("U2", "One", 1991, None), Genre::Rock);
    }

    #[test]
    fn test_hint_used_for_unknown_artist() {
        let c = classifier();
        assert_eq!(
            c.classify_with_rule("Unlisted Act", "Some Song", 1985, Some("R&B")),
            (Genre::Rnb, GenreRule::Hint)
        );
        // unknown hints fall through
        let (_, rule) = c.classify_with_rule("Unlisted Act", "Some Song", 1985, Some("polka"));
        assert_eq!(rule, GenreRule::Era);
    }

    #[test]
    fn test_title_keyword() {
        let c = classifier();
        assert_eq!(
            c.classify_with_rule("Unlisted Act", "Whiskey River", 1975, None),
            (Genre::Country, GenreRule::TitleKeyword)
        );
        // substrings of keywords do not count
        let (_, rule) = c.classify_with_rule("Unlisted Act", "Rocket Man", 1975, None);
        assert_eq!(rule, GenreRule::Era);
    }

    #[test]
    fn test_same_unknown_artist_follows_decade_rule() {
        let c = classifier();
        assert_eq!(c.classify("Unlisted Act", "Untitled", 1965, None), Genre::Rock);
        assert_eq!(c.classify("Unlisted Act", "Untitled", 1985, None), Genre::Pop);
    }

    #[test]
    fn test_total_with_fallback() {
        let c = classifier();
        assert_eq!(
            c.classify_with_rule("", "", 1900, None),
            (Genre::Other, GenreRule::Fallback)
        );
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("ti feat someone", "ti"));
        assert!(!contains_word("tiesto", "ti"));
        assert!(contains_word("some u2 tribute", "u2"));
        assert!(!contains_word("anything", ""));
    }
}
