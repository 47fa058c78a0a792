//! Collapse near-duplicate fusion calls.
//!
//! Calls are grouped by their ordered (Chromosome1, Chromosome2) pair. Inside a
//! group every pair of calls reporting the same (KnownGene1, KnownGene2) is
//! scored on junction-sequence similarity, and when the score strictly exceeds
//! the threshold the later call in file order is dropped.
//!
//! A call is dropped iff it is the later member of at least one qualifying
//! pair. This is not a transitive closure: with A~B and C~B but A!~C (B last),
//! only B is dropped and A and C both survive.

use indexmap::IndexMap;
use log::{debug, info};
use rayon::prelude::*;

use crate::config::MergeConfig;
use crate::report::FusionRecord;
use crate::utils::similarity::similarity_ratio;

/// A call removed as a duplicate, with the call that caused its removal.
/// Both values are indices into the merger's input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedCall {
    pub dropped: usize,
    pub kept_by: usize,
    pub similarity: f64,
}

/// Counters collected while merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub input_records: usize,
    pub partitions: usize,
    /// Pairs that passed the gene gate and were scored
    pub scored_pairs: usize,
}

/// Result of [`FusionMerger::merge`].
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Surviving calls in original file order
    pub fusions: Vec<FusionRecord>,
    /// Input index of each surviving call (parallel to `fusions`)
    pub survivors: Vec<usize>,
    /// Dropped calls, sorted by input index
    pub merged: Vec<MergedCall>,
    /// The dropped records themselves (parallel to `merged`)
    pub removed: Vec<FusionRecord>,
    pub stats: MergeStats,
}

impl MergeOutcome {
    /// Look up a record, kept or dropped, by its input index.
    pub fn record(&self, index: usize) -> Option<&FusionRecord> {
        if let Ok(pos) = self.survivors.binary_search(&index) {
            return Some(&self.fusions[pos]);
        }
        self.merged
            .binary_search_by_key(&index, |m| m.dropped)
            .ok()
            .map(|pos| &self.removed[pos])
    }
}

/// Pairwise duplicate detector for fusion calls.
#[derive(Debug, Clone)]
pub struct FusionMerger {
    min_similarity: f64,
    require_gene_match: bool,
    parallel: bool,
}

impl Default for FusionMerger {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

/// Merges found in one partition and the number of pairs scored there.
type PartitionMerges = (Vec<MergedCall>, usize);

impl FusionMerger {
    pub fn new(min_similarity: f64) -> Self {
        Self {
            min_similarity,
            ..Self::default()
        }
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        let t = &config.thresholds.merge;
        Self {
            min_similarity: t.min_similarity,
            require_gene_match: t.require_gene_match,
            parallel: t.parallel,
        }
    }

    /// Toggle rayon scoring across partitions. Output is identical either way.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn min_similarity(&self) -> f64 {
        self.min_similarity
    }

    /// Find duplicates without consuming the input.
    ///
    /// Returns one merge entry per dropped call, sorted by input index.
    pub fn find_duplicates(&self, records: &[FusionRecord]) -> (Vec<MergedCall>, MergeStats) {
        let partitions = partition_by_chromosome_pair(records);

        let results: Vec<PartitionMerges> = if self.parallel {
            partitions
                .par_iter()
                .map(|members| self.merge_partition(records, members))
                .collect()
        } else {
            partitions
                .iter()
                .map(|members| self.merge_partition(records, members))
                .collect()
        };

        let mut stats = MergeStats {
            input_records: records.len(),
            partitions: partitions.len(),
            scored_pairs: 0,
        };
        let mut merged: Vec<MergedCall> = Vec::new();
        for (partition_merged, scored) in results {
            stats.scored_pairs += scored;
            merged.extend(partition_merged);
        }
        // Partitions interleave in the input; restore file order
        merged.sort_by_key(|m| m.dropped);

        (merged, stats)
    }

    /// Deduplicate `records`, returning the survivors in their original order.
    ///
    /// Survivors are moved out of the input rather than cloned.
    pub fn merge(&self, records: Vec<FusionRecord>) -> MergeOutcome {
        let (merged, stats) = self.find_duplicates(&records);

        let mut is_dropped = vec![false; records.len()];
        for m in &merged {
            is_dropped[m.dropped] = true;
        }

        let mut survivors = Vec::with_capacity(records.len() - merged.len());
        let mut fusions = Vec::with_capacity(records.len() - merged.len());
        let mut removed = Vec::with_capacity(merged.len());
        for (idx, record) in records.into_iter().enumerate() {
            if is_dropped[idx] {
                removed.push(record);
            } else {
                survivors.push(idx);
                fusions.push(record);
            }
        }

        info!(
            "Merged {} fusion calls into {} ({} duplicates across {} chromosome pairs, {} pairs scored)",
            stats.input_records,
            fusions.len(),
            merged.len(),
            stats.partitions,
            stats.scored_pairs
        );

        MergeOutcome {
            fusions,
            survivors,
            merged,
            removed,
            stats,
        }
    }

    fn merge_partition(&self, records: &[FusionRecord], members: &[usize]) -> PartitionMerges {
        let n = members.len();
        if n < 2 {
            return (Vec::new(), 0);
        }

        let junctions: Vec<Vec<u8>> = members
            .iter()
            .map(|&i| records[i].fusion_junction_sequence.to_ascii_lowercase().into_bytes())
            .collect();

        let mut kept_by: Vec<Option<(usize, f64)>> = vec![None; n];
        let mut scored = 0usize;

        for x in 0..n {
            let rx = &records[members[x]];
            for y in (x + 1)..n {
                // Already dropped by an earlier (lower-indexed) partner
                if kept_by[y].is_some() {
                    continue;
                }
                let ry = &records[members[y]];
                if self.require_gene_match && rx.gene_pair() != ry.gene_pair() {
                    continue;
                }
                scored += 1;
                let ratio = similarity_ratio(&junctions[x], &junctions[y]);
                if ratio > self.min_similarity {
                    debug!(
                        "{} ({}) duplicates {} ({}), similarity {:.3}",
                        ry.id, ry.fusion_gene, rx.id, rx.fusion_gene, ratio
                    );
                    kept_by[y] = Some((members[x], ratio));
                }
            }
        }

        let merged = kept_by
            .into_iter()
            .enumerate()
            .filter_map(|(y, k)| {
                k.map(|(kept, similarity)| MergedCall {
                    dropped: members[y],
                    kept_by: kept,
                    similarity,
                })
            })
            .collect();

        (merged, scored)
    }
}

/// Group record indices by ordered (Chromosome1, Chromosome2), each group in file order.
pub fn partition_by_chromosome_pair(records: &[FusionRecord]) -> Vec<Vec<usize>> {
    let mut partitions: IndexMap<(&str, &str), Vec<usize>> = IndexMap::new();
    for (idx, record) in records.iter().enumerate() {
        partitions.entry(record.chromosome_pair()).or_default().push(idx);
    }
    partitions.into_values().collect()
}

/// Deduplicate with the given threshold and default settings.
pub fn merge_fusions(records: Vec<FusionRecord>, min_similarity: f64) -> Vec<FusionRecord> {
    FusionMerger::new(min_similarity).merge(records).fusions
}
