//! Lyrics analysis library - shared modules for all binaries.

pub mod aggregate;
pub mod config;
pub mod contamination;
pub mod error;
pub mod events;
pub mod frequency;
pub mod genre;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reference;
pub mod safety;
pub mod sentiment;
pub mod tfidf;

pub use error::{Error, Result};
