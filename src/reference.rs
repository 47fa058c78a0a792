//! Random access to an indexed reference FASTA.
//!
//! Coordinates are one-based and end-exclusive: `get_sequence("chr1", 1, 9)`
//! returns the first eight bases of chr1.

use std::fs::File;
use std::sync::Mutex;

use indexmap::IndexMap;
use log::{debug, info};
use noodles::core::{Position, Region};
use noodles::fasta;

use crate::error::{FusionError, Result};

type FastaReader = fasta::io::IndexedReader<fasta::io::BufReader<File>>;

/// Indexed FASTA reference (`<path>.fai` must exist).
///
/// Only the queried interval is read from disk; nothing is cached between calls.
pub struct ReferenceAccessor {
    path: String,
    reader: Mutex<FastaReader>,
    lengths: IndexMap<String, u64>,
}

impl ReferenceAccessor {
    pub fn open(path: &str) -> Result<Self> {
        let reader = fasta::io::indexed_reader::Builder::default()
            .build_from_path(path)
            .map_err(|e| FusionError::Reference(format!("Error opening indexed FASTA {}: {}", path, e)))?;

        let records: &[fasta::fai::Record] = reader.index().as_ref();
        let lengths: IndexMap<String, u64> = records
            .iter()
            .map(|record| (String::from_utf8_lossy(record.name().as_ref()).into_owned(), record.length()))
            .collect();

        info!("Reference {}: {} sequences", path, lengths.len());
        Ok(ReferenceAccessor {
            path: path.to_string(),
            reader: Mutex::new(reader),
            lengths,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Chromosome name to sequence length, in index order.
    pub fn get_info(&self) -> &IndexMap<String, u64> {
        &self.lengths
    }

    pub fn chromosome_length(&self, chrom: &str) -> Option<u64> {
        self.lengths.get(chrom).copied()
    }

    /// Bases `start..end` of `chrom` (one-based, end excluded).
    ///
    /// An empty range (`end <= start`) yields an empty string. Unknown
    /// chromosomes, `start == 0`, and ranges past the chromosome end are errors.
    pub fn get_sequence(&self, chrom: &str, start: u64, end: u64) -> Result<String> {
        let length = self
            .chromosome_length(chrom)
            .ok_or_else(|| FusionError::Reference(format!("Unknown chromosome '{}'", chrom)))?;
        if start == 0 {
            return Err(FusionError::Reference(format!(
                "Coordinates are one-based; got start 0 on {}",
                chrom
            )));
        }
        if end <= start {
            return Ok(String::new());
        }
        if end - 1 > length {
            return Err(FusionError::Reference(format!(
                "Range {}:{}-{} exceeds sequence length {}",
                chrom, start, end, length
            )));
        }

        // Region intervals are closed
        let region = Region::new(chrom, to_position(start)?..=to_position(end - 1)?);
        debug!("Querying {} for {}", self.path, region);

        let mut reader = self
            .reader
            .lock()
            .map_err(|_| FusionError::Reference(format!("FASTA reader for {} is poisoned", self.path)))?;
        let record = reader
            .query(&region)
            .map_err(|e| FusionError::Reference(format!("Error reading {} from {}: {}", region, self.path, e)))?;

        Ok(String::from_utf8_lossy(record.sequence().as_ref()).into_owned())
    }
}

fn to_position(n: u64) -> Result<Position> {
    usize::try_from(n)
        .ok()
        .and_then(|n| Position::try_from(n).ok())
        .ok_or_else(|| FusionError::Reference(format!("Invalid coordinate {}", n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const FASTA: &str = ">chr1\nACGTACGTAC\nGTTTGGCC\n>chr2\nNNNNAAAACCCC\n";
    // name, length, offset, line bases, line width
    const FAI: &str = "chr1\t18\t6\t10\t11\nchr2\t12\t32\t12\t13\n";

    fn write_reference(dir: &TempDir) -> String {
        let path = dir.path().join("ref.fa");
        std::fs::File::create(&path).unwrap().write_all(FASTA.as_bytes()).unwrap();
        let fai = dir.path().join("ref.fa.fai");
        std::fs::File::create(&fai).unwrap().write_all(FAI.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_get_sequence_one_based_end_exclusive() {
        let dir = TempDir::new().unwrap();
        let reference = ReferenceAccessor::open(&write_reference(&dir)).unwrap();

        assert_eq!(reference.get_sequence("chr1", 1, 9).unwrap(), "ACGTACGT");
        // spans the FASTA line break
        assert_eq!(reference.get_sequence("chr1", 9, 13).unwrap(), "ACGT");
        assert_eq!(reference.get_sequence("chr1", 11, 19).unwrap(), "GTTTGGCC");
        assert_eq!(reference.get_sequence("chr2", 5, 9).unwrap(), "AAAA");
        assert_eq!(reference.get_sequence("chr2", 5, 5).unwrap(), "");
    }

    #[test]
    fn test_get_sequence_errors() {
        let dir = TempDir::new().unwrap();
        let reference = ReferenceAccessor::open(&write_reference(&dir)).unwrap();

        assert!(matches!(reference.get_sequence("chr3", 1, 5), Err(FusionError::Reference(_))));
        assert!(reference.get_sequence("chr1", 0, 5).is_err());
        assert!(reference.get_sequence("chr1", 10, 20).is_err());
    }

    #[test]
    fn test_repeated_queries_across_chromosomes() {
        let dir = TempDir::new().unwrap();
        let reference = ReferenceAccessor::open(&write_reference(&dir)).unwrap();

        for _ in 0..3 {
            assert_eq!(reference.get_sequence("chr2", 1, 5).unwrap(), "NNNN");
            assert_eq!(reference.get_sequence("chr1", 15, 19).unwrap(), "GGCC");
            assert_eq!(reference.get_sequence("chr2", 9, 13).unwrap(), "CCCC");
        }
    }

    #[test]
    fn test_get_info() {
        let dir = TempDir::new().unwrap();
        let reference = ReferenceAccessor::open(&write_reference(&dir)).unwrap();
        let info = reference.get_info();
        assert_eq!(info.len(), 2);
        assert_eq!(info.get_index(0), Some((&"chr1".to_string(), &18)));
        assert_eq!(reference.chromosome_length("chr2"), Some(12));
        assert_eq!(reference.chromosome_length("chrM"), None);
    }

    #[test]
    fn test_open_without_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noindex.fa");
        std::fs::File::create(&path).unwrap().write_all(FASTA.as_bytes()).unwrap();
        let result = ReferenceAccessor::open(path.to_str().unwrap());
        assert!(matches!(result, Err(FusionError::Reference(_))));
    }
}
