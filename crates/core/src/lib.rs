//! Core types and traits for derivex
//!
//! This crate defines the foundational types shared by the build pipeline:
//! - Error / DocumentError: pipeline failures vs. per-document skips
//! - Timestamp: freshness marker of a published index
//! - Document / LabeledDocument: corpus input
//! - Analyzer: the word-level tokenizer capability
//! - BuilderConfig: TOML-backed builder configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod error;
pub mod timestamp;
pub mod traits;

pub use config::{BuilderConfig, CounterConfig, CounterMode, SortConfig, CONFIG_FILE_NAME};
pub use document::{Document, LabeledDocument};
pub use error::{DocumentError, Error, Result};
pub use timestamp::Timestamp;
pub use traits::Analyzer;
