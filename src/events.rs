//! Historical events shown alongside the charts.
//!
//! `events.json` is maintained by hand and is only read here, never written.
//! Validation reports problems instead of failing so a stale entry does not
//! block a run.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    pub year: u16,
    pub label: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventCategory {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsFile {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub categories: BTreeMap<String, EventCategory>,
}

/// A problem with one event entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventIssue {
    UnknownCategory { index: usize, category: String },
    OutsideYears { index: usize, year: u16 },
}

impl fmt::Display for EventIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventIssue::UnknownCategory { index, category } => {
                write!(f, "event #{} uses unknown category '{}'", index, category)
            }
            EventIssue::OutsideYears { index, year } => {
                write!(f, "event #{} is dated {}, outside the covered years", index, year)
            }
        }
    }
}

impl EventsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check every event against the category table and the covered years
    /// (`[first, last]`, inclusive).
    pub fn validate(&self, years: Option<(u16, u16)>) -> Vec<EventIssue> {
        let mut issues = Vec::new();
        for (index, event) in self.events.iter().enumerate() {
            if !self.categories.contains_key(&event.category) {
                issues.push(EventIssue::UnknownCategory {
                    index,
                    category: event.category.clone(),
                });
            }
            if let Some((first, last)) = years {
                if event.year < first || event.year > last {
                    issues.push(EventIssue::OutsideYears {
                        index,
                        year: event.year,
                    });
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: &str = r##"{
        "events": [
            {"year": 1969, "label": "Woodstock", "category": "culture"},
            {"year": 1981, "label": "MTV launches", "category": "media"},
            {"year": 2030, "label": "Typo", "category": "culture"}
        ],
        "categories": {
            "culture": {"label": "Culture", "color": "#e4572e"}
        }
    }"##;

    #[test]
    fn test_parse_events() {
        let file = EventsFile::parse(EVENTS).unwrap();
        assert_eq!(file.events.len(), 3);
        assert_eq!(file.categories["culture"].color, "#e4572e");
    }

    #[test]
    fn test_validate_reports_issues() {
        let file = EventsFile::parse(EVENTS).unwrap();
        let issues = file.validate(Some((1959, 2023)));
        assert_eq!(
            issues,
            vec![
                EventIssue::UnknownCategory {
                    index: 1,
                    category: "media".into()
                },
                EventIssue::OutsideYears { index: 2, year: 2030 },
            ]
        );
        assert!(issues[0].to_string().contains("unknown category 'media'"));
    }

    #[test]
    fn test_validate_without_years_only_checks_categories() {
        let file = EventsFile::parse(EVENTS).unwrap();
        assert_eq!(file.validate(None).len(), 1);
    }

    #[test]
    fn test_malformed_events_is_an_error() {
        assert!(matches!(EventsFile::parse("{\"events\": 3}"), Err(Error::Json(_))));
    }
}
