//! Output collector for deduplication results
//!
//! Builds a [`DedupOutput`] from a loaded report and writes it as JSON, and
//! re-emits the surviving calls in the report's own tab-separated format.

use std::fs::File;
use std::io::{BufWriter, Write};

use log::warn;

use crate::input::AlignmentStore;
use crate::reference::ReferenceAccessor;
use crate::report::{FusionRecord, FusionReport, REPORT_COLUMNS};

use super::types::{AlignmentSummary, DedupOutput, DedupSummary, MergedFusion, ReferenceSummary};

/// Builder for the dedup result document
pub struct OutputCollector {
    output: DedupOutput,
}

impl OutputCollector {
    pub fn new() -> Self {
        Self {
            output: DedupOutput {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
        }
    }

    /// Fill in merge results, and store summaries when the report has them
    pub fn with_report(mut self, report: &FusionReport) -> Self {
        let outcome = report.outcome();
        let stats = report.stats();

        self.output.report = report.path().to_string();
        self.output.min_similarity = report.min_similarity();
        self.output.summary = DedupSummary {
            input_records: stats.input_records,
            output_records: outcome.fusions.len(),
            chromosome_pairs: stats.partitions,
            scored_pairs: stats.scored_pairs,
        };
        self.output.fusions = outcome.fusions.clone();
        self.output.merged = outcome
            .merged
            .iter()
            .zip(&outcome.removed)
            .map(|(m, dropped)| MergedFusion {
                id: dropped.id.clone(),
                merged_into: outcome
                    .record(m.kept_by)
                    .map(|r| r.id.clone())
                    .unwrap_or_default(),
                similarity: m.similarity,
                row: m.dropped,
            })
            .collect();

        if let Some(store) = report.alignments() {
            self = self.with_alignments(store);
        }
        if let Some(reference) = report.reference() {
            self = self.with_reference(reference);
        }
        self
    }

    pub fn with_alignments(mut self, store: &AlignmentStore) -> Self {
        self.output.alignments = Some(AlignmentSummary {
            path: store.path().to_string(),
            alignments: store.len(),
            distinct_reads: store.distinct_names(),
        });
        self
    }

    pub fn with_reference(mut self, reference: &ReferenceAccessor) -> Self {
        let info = reference.get_info();
        self.output.reference = Some(ReferenceSummary {
            path: reference.path().to_string(),
            sequences: info.len(),
            total_length: info.values().sum(),
        });
        self
    }

    /// Build and return the final output
    pub fn build(self) -> DedupOutput {
        self.output
    }

    pub fn output(&self) -> &DedupOutput {
        &self.output
    }

    /// Write JSON to the specified path.
    ///
    /// The document is checked against its schema first when validation is
    /// enabled; violations are fatal only in debug builds.
    pub fn write_json(&self, path: &str) -> std::io::Result<()> {
        if validation_enabled() {
            let violations = self.output.schema_violations().map_err(std::io::Error::other)?;
            if !violations.is_empty() {
                let msg = violations.join("; ");
                warn!("{} schema violations in {}: {}", violations.len(), path, msg);
                if cfg!(debug_assertions) {
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, msg));
                }
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &self.output).map_err(std::io::Error::other)
    }

    /// Write surviving calls as a report with the canonical header
    pub fn write_tsv(&self, path: &str) -> std::io::Result<()> {
        let file = File::create(path)?;
        write_fusions_tsv(BufWriter::new(file), &self.output.fusions)
    }

    /// Write "{prefix}.dedup.json" and "{prefix}.dedup.tsv"
    pub fn write_to_prefix(&self, prefix: &str) -> std::io::Result<()> {
        self.write_json(&format!("{}.dedup.json", prefix))?;
        self.write_tsv(&format!("{}.dedup.tsv", prefix))
    }
}

impl Default for OutputCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Always on in debug builds; release builds opt in with `FUSMERGE_VALIDATE_OUTPUT=1`.
fn validation_enabled() -> bool {
    cfg!(debug_assertions)
        || std::env::var("FUSMERGE_VALIDATE_OUTPUT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
}

/// Write fusion calls in report format, header first.
pub fn write_fusions_tsv<W: Write>(mut writer: W, fusions: &[FusionRecord]) -> std::io::Result<()> {
    writeln!(writer, "{}", REPORT_COLUMNS.join("\t"))?;
    for fusion in fusions {
        writeln!(writer, "{}", fusion.to_tsv_line())?;
    }
    writer.flush()
}

impl DedupOutput {
    /// Load a result document from a JSON file
    pub fn load_json(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        let output: Self = serde_json::from_reader(file)?;
        Ok(output)
    }
}
