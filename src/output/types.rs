//! Output data structures for deduplication results
//!
//! These are serialized to `<prefix>.dedup.json`.

use std::sync::LazyLock;

use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};

use crate::report::FusionRecord;

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| schema_for!(DedupOutput));

/// Top-level result document
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DedupOutput {
    /// fusmerge version
    pub version: String,

    /// Path of the input report
    pub report: String,

    /// Similarity ratio that had to be exceeded for a merge
    pub min_similarity: f64,

    /// Merge counters
    pub summary: DedupSummary,

    /// Surviving fusion calls, in report order
    pub fusions: Vec<FusionRecord>,

    /// Calls removed as duplicates, in report order
    pub merged: Vec<MergedFusion>,

    /// Fusion-read alignment store, if one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignments: Option<AlignmentSummary>,

    /// Reference FASTA, if one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DedupSummary {
    pub input_records: usize,
    pub output_records: usize,
    /// Distinct (Chromosome1, Chromosome2) pairs
    pub chromosome_pairs: usize,
    /// Same-gene-pair comparisons that were scored
    pub scored_pairs: usize,
}

/// A call dropped as a duplicate of an earlier call
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MergedFusion {
    /// ID of the dropped call
    pub id: String,
    /// ID of the earlier call it duplicates
    pub merged_into: String,
    /// Junction-sequence similarity between the two
    pub similarity: f64,
    /// 0-based data-row index of the dropped call
    pub row: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AlignmentSummary {
    pub path: String,
    /// Alignment records, including supplementary and secondary
    pub alignments: usize,
    pub distinct_reads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceSummary {
    pub path: String,
    pub sequences: usize,
    pub total_length: u64,
}

impl DedupOutput {
    /// JSON Schema of the result document, generated from these types.
    pub fn json_schema() -> &'static Schema {
        &SCHEMA
    }

    /// Check the serialized document against [`DedupOutput::json_schema`].
    ///
    /// Returns one message per violation, prefixed with its instance path.
    pub fn schema_violations(&self) -> Result<Vec<String>, String> {
        let schema = serde_json::to_value(&*SCHEMA).map_err(|e| format!("Failed to serialize schema: {}", e))?;
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| format!("Failed to compile schema: {}", e))?;
        let value = serde_json::to_value(self).map_err(|e| format!("Failed to serialize output: {}", e))?;
        Ok(validator
            .iter_errors(&value)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect())
    }
}
