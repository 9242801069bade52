//! Versioned reference tables: stopwords, contamination markers and the
//! genre classification rules.
//!
//! The tables ship embedded from `data/reference.toml` and can be replaced
//! with a file of the same shape. They are parsed and validated once per
//! run; the components compile their own lookup structures from them.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Genre;

const EMBEDDED_REFERENCE: &str = include_str!("../data/reference.toml");

/// An era default: songs in `start..=end` by otherwise unclassified
/// artists get `genre`.
#[derive(Debug, Clone, Deserialize)]
pub struct EraRule {
    pub start: u16,
    pub end: u16,
    pub genre: String,
}

/// Raw reference tables as stored in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceTables {
    pub version: String,
    pub genre_priority: Vec<String>,
    pub stopwords: Vec<String>,
    #[serde(default)]
    pub keyword_stopwords: Vec<String>,
    pub contamination_markers: Vec<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
    pub artists: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub title_keywords: BTreeMap<String, Vec<String>>,
    pub eras: Vec<EraRule>,
}

/// Era rule with a parsed genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Era {
    pub start: u16,
    pub end: u16,
    pub genre: Genre,
}

impl ReferenceTables {
    /// Tables compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_REFERENCE, "embedded reference tables")
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
        let tables: ReferenceTables = toml::from_str(text).map_err(|source| Error::Toml {
            origin: origin.to_string(),
            source,
        })?;
        tables.validate()?;
        Ok(tables)
    }

    /// Check every genre code and rule shape up front, so a bad table
    /// fails the run before any output is touched.
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(invalid("version must not be empty"));
        }
        let priority = self.priority()?;
        if priority.contains(&Genre::Other) {
            return Err(invalid("genre_priority must not contain 'other'"));
        }
        self.artist_tables()?;
        self.override_table()?;
        self.keyword_table()?;
        self.era_table()?;
        if let Some(marker) = self
            .contamination_markers
            .iter()
            .find(|m| m.trim().is_empty() || m.to_lowercase() != **m)
        {
            return Err(invalid(&format!(
                "contamination marker '{}' must be non-empty and lower-case",
                marker
            )));
        }
        Ok(())
    }

    /// Artist-table lookup order, without duplicates.
    pub fn priority(&self) -> Result<Vec<Genre>> {
        let mut out = Vec::with_capacity(self.genre_priority.len());
        for code in &self.genre_priority {
            let genre = parse_genre(code)?;
            if out.contains(&genre) {
                return Err(invalid(&format!("genre '{}' repeated in genre_priority", code)));
            }
            out.push(genre);
        }
        Ok(out)
    }

    /// Artist tables in priority order. Genres with a table but no priority
    /// slot are rejected; a rule that can never fire is a table bug.
    pub fn artist_tables(&self) -> Result<Vec<(Genre, &[String])>> {
        let priority = self.priority()?;
        for code in self.artists.keys() {
            let genre = parse_genre(code)?;
            if !priority.contains(&genre) {
                return Err(invalid(&format!(
                    "artist table '{}' is missing from genre_priority",
                    code
                )));
            }
        }
        Ok(priority
            .into_iter()
            .filter_map(|genre| {
                self.artists
                    .get(genre.code())
                    .map(|names| (genre, names.as_slice()))
            })
            .collect())
    }

    pub fn override_table(&self) -> Result<Vec<(&str, Genre)>> {
        self.overrides
            .iter()
            .map(|(artist, code)| Ok((artist.as_str(), parse_genre(code)?)))
            .collect()
    }

    /// Title keywords in taxonomy order.
    pub fn keyword_table(&self) -> Result<Vec<(Genre, &[String])>> {
        let mut out = self
            .title_keywords
            .iter()
            .map(|(code, words)| Ok((parse_genre(code)?, words.as_slice())))
            .collect::<Result<Vec<_>>>()?;
        out.sort_by_key(|(genre, _)| *genre);
        Ok(out)
    }

    /// Era rules sorted by start year; overlapping ranges are rejected.
    pub fn era_table(&self) -> Result<Vec<Era>> {
        if self.eras.is_empty() {
            return Err(invalid("at least one era rule is required"));
        }
        let mut eras = self
            .eras
            .iter()
            .map(|rule| {
                if rule.start > rule.end {
                    return Err(invalid(&format!(
                        "era {}-{} starts after it ends",
                        rule.start, rule.end
                    )));
                }
                Ok(Era {
                    start: rule.start,
                    end: rule.end,
                    genre: parse_genre(&rule.genre)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        eras.sort_by_key(|era| era.start);
        for pair in eras.windows(2) {
            if pair[1].start <= pair[0].end {
                return Err(invalid(&format!(
                    "eras {}-{} and {}-{} overlap",
                    pair[0].start, pair[0].end, pair[1].start, pair[1].end
                )));
            }
        }
        Ok(eras)
    }
}

fn parse_genre(code: &str) -> Result<Genre> {
    Genre::ALL
        .into_iter()
        .find(|g| g.code() == code)
        .ok_or_else(|| invalid(&format!("unknown genre code '{}'", code)))
}

fn invalid(msg: &str) -> Error {
    Error::InvalidReference(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        version = "test"
        genre_priority = ["hiphop", "rock", "pop"]
        stopwords = ["the"]
        contamination_markers = ["guermantes"]

        [artists]
        rock = ["beatles"]
        hiphop = ["eminem"]

        [[eras]]
        start = 1960
        end = 1969
        genre = "rock"
    "#;

    #[test]
    fn test_embedded_tables_are_valid() {
        let tables = ReferenceTables::embedded().unwrap();
        assert!(!tables.stopwords.is_empty());
        assert!(tables.contamination_markers.contains(&"guermantes".to_string()));
        let priority = tables.priority().unwrap();
        assert_eq!(priority[0], Genre::Hiphop);
        assert_eq!(tables.era_table().unwrap().len(), 8);
    }

    #[test]
    fn test_artist_tables_follow_priority() {
        let tables = ReferenceTables::parse(MINIMAL, "test").unwrap();
        let order: Vec<Genre> = tables.artist_tables().unwrap().iter().map(|(g, _)| *g).collect();
        assert_eq!(order, vec![Genre::Hiphop, Genre::Rock]);
    }

    #[test]
    fn test_unknown_genre_rejected() {
        let text = MINIMAL.replace("rock = [\"beatles\"]", "polka = [\"weird al\"]");
        let err = ReferenceTables::parse(&text, "test").unwrap_err();
        assert!(err.to_string().contains("unknown genre code 'polka'"));
    }

    #[test]
    fn test_overlapping_eras_rejected() {
        let text = format!(
            "{}\n[[eras]]\nstart = 1965\nend = 1975\ngenre = \"pop\"\n",
            MINIMAL
        );
        let err = ReferenceTables::parse(&text, "test").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_other_not_allowed_in_priority() {
        let text = MINIMAL.replace(r#"["hiphop", "rock", "pop"]"#, r#"["hiphop", "rock", "other"]"#);
        assert!(ReferenceTables::parse(&text, "test").is_err());
    }

    #[test]
    fn test_table_without_priority_rejected() {
        let text = MINIMAL.replace("hiphop = [\"eminem\"]", "hiphop = [\"eminem\"]\ndance = [\"abba\"]");
        let err = ReferenceTables::parse(&text, "test").unwrap_err();
        assert!(err.to_string().contains("missing from genre_priority"));
    }
}
