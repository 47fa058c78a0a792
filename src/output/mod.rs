//! Result output for deduplicated reports
//!
//! This module provides:
//! - `DedupOutput`: the JSON result document
//! - `OutputCollector`: a builder that fills it from a loaded report and writes it
//!
//! The JSON Schema is generated from the types with `schemars` and checked
//! with `jsonschema` before each write in debug builds.
//!
//! # Example
//!
//! ```ignore
//! use fusmerge::output::OutputCollector;
//! use fusmerge::report::FusionReport;
//!
//! let report = FusionReport::load("sample.FusionReport.txt", None, None)?;
//! OutputCollector::new()
//!     .with_report(&report)
//!     .write_to_prefix("sample")?;
//! ```

pub mod collector;
pub mod types;

pub use collector::{OutputCollector, write_fusions_tsv};
pub use types::{AlignmentSummary, DedupOutput, DedupSummary, MergedFusion, ReferenceSummary};
