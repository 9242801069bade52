//! Distinctive keywords per partition via TF-IDF.
//!
//! Every partition's combined keyword-profile text is one document. The
//! genre documents are scored against each other; each genre×decade
//! document is scored against the other genres of the same decade.
//!
//! Scoring per document set of size `n`:
//!
//! - `tf` is the raw term count in the document
//! - terms whose document frequency exceeds `max_df * n` are pruned
//! - the vocabulary keeps the `max_features` terms with the highest corpus
//!   count
//! - `idf = ln((1 + n) / (1 + df)) + 1`
//! - each document vector is L2-normalised
//!
//! Equal scores are ordered by the term's first appearance in the
//! canonical traversal (partitions alphabetically, songs by id).

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::genre_decade_key;
use crate::config::TfidfConfig;
use crate::models::{round_to, Genre, Song, TfidfEntry};
use crate::normalize::SongTokens;

type TermId = u32;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TfidfTables {
    pub by_genre: BTreeMap<String, Vec<TfidfEntry>>,
    pub by_genre_decade: BTreeMap<String, Vec<TfidfEntry>>,
}

/// Global term ids in first-seen order.
#[derive(Debug, Default)]
struct Vocabulary {
    ids: FxHashMap<String, TermId>,
    terms: Vec<String>,
}

impl Vocabulary {
    fn intern(&mut self, term: &str) -> TermId {
        if let Some(id) = self.ids.get(term) {
            return *id;
        }
        let id = self.terms.len() as TermId;
        self.ids.insert(term.to_string(), id);
        self.terms.push(term.to_string());
        id
    }
}

/// One document: term counts sorted by term id.
#[derive(Debug, Default, Clone)]
struct Document {
    counts: Vec<(TermId, usize)>,
}

impl Document {
    fn from_ids(ids: &[TermId]) -> Self {
        let mut map: FxHashMap<TermId, usize> = FxHashMap::default();
        for id in ids {
            *map.entry(*id).or_default() += 1;
        }
        let mut counts: Vec<(TermId, usize)> = map.into_iter().collect();
        counts.sort_unstable_by_key(|(id, _)| *id);
        Self { counts }
    }
}

pub struct TfidfExtractor {
    config: TfidfConfig,
}

impl TfidfExtractor {
    pub fn new(config: TfidfConfig) -> Self {
        Self { config }
    }

    /// Keyword tables for the genre and genre×decade partitions. Only clean
    /// songs contribute; `tokens[i]` belongs to `songs[i]`, and `songs` must
    /// be in id order.
    pub fn extract(&self, songs: &[Song], tokens: &[SongTokens]) -> TfidfTables {
        // (genre, decade) -> term ids in song order
        let mut partitions: BTreeMap<Genre, BTreeMap<u16, Vec<TermId>>> = BTreeMap::new();
        let clean: Vec<(&Song, &SongTokens)> = songs
            .iter()
            .zip(tokens)
            .filter(|(song, _)| song.is_analyzable())
            .collect();

        // Canonical traversal: genres alphabetically by code, songs by id.
        let mut genre_order: Vec<Genre> =
            clean.iter().map(|(s, _)| s.genre).collect::<BTreeSet<_>>().into_iter().collect();
        genre_order.sort_by_key(|g| g.code());

        let mut vocab = Vocabulary::default();
        for genre in &genre_order {
            for (song, toks) in clean.iter().filter(|(s, _)| s.genre == *genre) {
                let ids = toks.keywords.iter().map(|t| vocab.intern(t));
                partitions
                    .entry(*genre)
                    .or_default()
                    .entry(song.decade())
                    .or_default()
                    .extend(ids);
            }
        }

        let mut tables = TfidfTables::default();

        let genre_docs: Vec<(String, Document)> = genre_order
            .iter()
            .map(|genre| {
                let ids: Vec<TermId> = partitions[genre].values().flatten().copied().collect();
                (genre.code().to_string(), Document::from_ids(&ids))
            })
            .collect();
        tables.by_genre = self.score(
            &genre_docs,
            &vocab,
            self.config.genre_max_features,
            self.config.genre_top_n,
        );

        let decades: BTreeSet<u16> = partitions.values().flat_map(|d| d.keys().copied()).collect();
        for decade in decades {
            let docs: Vec<(String, Document)> = genre_order
                .iter()
                .filter_map(|genre| {
                    partitions[genre]
                        .get(&decade)
                        .map(|ids| (genre_decade_key(*genre, decade), Document::from_ids(ids)))
                })
                .collect();
            tables.by_genre_decade.extend(self.score(
                &docs,
                &vocab,
                self.config.genre_decade_max_features,
                self.config.genre_decade_top_n,
            ));
        }

        tables
    }

    /// Score one document set. Every document gets an entry, possibly empty.
    fn score(
        &self,
        docs: &[(String, Document)],
        vocab: &Vocabulary,
        max_features: usize,
        top_n: usize,
    ) -> BTreeMap<String, Vec<TfidfEntry>> {
        let n = docs.len();
        let mut df: BTreeMap<TermId, usize> = BTreeMap::new();
        let mut corpus_count: BTreeMap<TermId, usize> = BTreeMap::new();
        for (_, doc) in docs {
            for (id, count) in &doc.counts {
                *df.entry(*id).or_default() += 1;
                *corpus_count.entry(*id).or_default() += count;
            }
        }

        let max_doc_count = self.config.max_df * n as f64;
        let mut kept: Vec<(TermId, usize)> = corpus_count
            .into_iter()
            .filter(|(id, _)| df[id] as f64 <= max_doc_count)
            .collect();
        // highest corpus count first, first-seen id on ties
        kept.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        kept.truncate(max_features);

        let idf: FxHashMap<TermId, f64> = kept
            .iter()
            .map(|(id, _)| {
                let value = ((1.0 + n as f64) / (1.0 + df[id] as f64)).ln() + 1.0;
                (*id, value)
            })
            .collect();

        docs.iter()
            .map(|(key, doc)| {
                let weights: Vec<(TermId, f64)> = doc
                    .counts
                    .iter()
                    .filter_map(|(id, tf)| idf.get(id).map(|w| (*id, *tf as f64 * w)))
                    .collect();
                (key.clone(), top_terms(weights, vocab, top_n))
            })
            .collect()
    }
}

/// L2-normalise one document vector and keep its `top_n` best terms.
fn top_terms(weights: Vec<(TermId, f64)>, vocab: &Vocabulary, top_n: usize) -> Vec<TfidfEntry> {
    let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm == 0.0 {
        return Vec::new();
    }
    let mut scored: Vec<(TermId, f64)> = weights
        .into_iter()
        .map(|(id, w)| (id, w / norm))
        .filter(|(id, score)| *score > 0.0 && !is_single_letter_run(&vocab.terms[*id as usize]))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
        .into_iter()
        .take(top_n)
        .map(|(id, score)| TfidfEntry {
            word: vocab.terms[id as usize].clone(),
            score: round_to(score, 4),
        })
        .collect()
}

/// "aaa", "ooo": vocal runs, not words.
fn is_single_letter_run(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    }
}
