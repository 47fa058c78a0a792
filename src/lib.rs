//! Collapse near-duplicate gene fusion calls from FusionMap-style reports.
//!
//! Calls that join the same ordered chromosome pair, name the same gene pair
//! and carry highly similar junction sequences are treated as one event; the
//! earliest call in the report is kept.

pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod reference;
pub mod report;

pub mod utils {
    pub mod similarity;
}

pub mod var {
    pub mod merge;
}

pub use error::{FusionError, Result};
pub use report::{FusionRecord, FusionReport};
pub use var::merge::{FusionMerger, MergeOutcome, merge_fusions};
