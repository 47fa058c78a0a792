//! Fusion-read alignment store backed by BAM or CRAM via noodles.
//!
//! The store is read once, front to back, and every alignment is kept in
//! memory so reads can be listed or looked up by name afterwards.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;

use anyhow::Result;
use log::info;
use noodles::bam;
use noodles::bgzf;
use noodles::cram;
use noodles::fasta;
use noodles::sam;

use crate::error::FusionError;

use noodles::sam::alignment::record::cigar::op::Kind as CigarKind;

/// Per-read attributes retained from the alignment store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadInfo {
    /// Query name, "*" when the record has none
    pub name: String,
    /// Reference sequence name, None when unplaced
    pub reference_name: Option<String>,
    /// 0-based leftmost position, -1 when unmapped
    pub position: i64,
    /// 0-based mate position, -1 when absent
    pub mate_position: i64,
    pub flag: u16,
    /// ASCII bases
    pub sequence: String,
    /// SAM-style CIGAR string, "*" when empty
    pub cigar: String,
}

impl ReadInfo {
    pub fn is_unmapped(&self) -> bool {
        self.flag & 0x4 != 0
    }

    pub fn is_reverse(&self) -> bool {
        self.flag & 0x10 != 0
    }

    pub fn is_supplementary(&self) -> bool {
        self.flag & 0x800 != 0
    }
}

fn cigar_char(kind: CigarKind) -> char {
    match kind {
        CigarKind::Match => 'M',
        CigarKind::Insertion => 'I',
        CigarKind::Deletion => 'D',
        CigarKind::Skip => 'N',
        CigarKind::SoftClip => 'S',
        CigarKind::HardClip => 'H',
        CigarKind::Pad => 'P',
        CigarKind::SequenceMatch => '=',
        CigarKind::SequenceMismatch => 'X',
    }
}

/// Format decoded CIGAR ops the way SAM prints them.
pub fn format_cigar(ops: &[(CigarKind, usize)]) -> String {
    if ops.is_empty() {
        return "*".to_string();
    }
    let mut s = String::new();
    for &(kind, len) in ops {
        s.push_str(&len.to_string());
        s.push(cigar_char(kind));
    }
    s
}

fn reference_names(header: &sam::Header) -> Vec<String> {
    header
        .reference_sequences()
        .keys()
        .map(|name| String::from_utf8_lossy(name).to_string())
        .collect()
}

fn lookup_name(refs: &[String], id: Option<usize>) -> Option<String> {
    id.and_then(|i| refs.get(i).cloned())
}

/// Decode a noodles BAM record.
fn decode_bam_record(rec: &bam::Record, refs: &[String]) -> Result<ReadInfo> {
    let name = rec
        .name()
        .map(|n| String::from_utf8_lossy(n.as_ref()).to_string())
        .unwrap_or_else(|| "*".to_string());

    let ref_id = rec.reference_sequence_id().transpose()?;
    let position = match rec.alignment_start() {
        Some(Ok(p)) => (p.get() as i64) - 1, // 1-based to 0-based
        Some(Err(e)) => return Err(e.into()),
        None => -1,
    };
    let mate_position = match rec.mate_alignment_start() {
        Some(Ok(p)) => (p.get() as i64) - 1,
        _ => -1,
    };

    let mut ops = Vec::new();
    for op_result in rec.cigar().iter() {
        let op = op_result?;
        ops.push((op.kind(), op.len()));
    }

    let sequence: Vec<u8> = rec.sequence().iter().collect();

    Ok(ReadInfo {
        name,
        reference_name: lookup_name(refs, ref_id),
        position,
        mate_position,
        flag: rec.flags().bits(),
        sequence: String::from_utf8_lossy(&sequence).to_string(),
        cigar: format_cigar(&ops),
    })
}

/// Decode any noodles alignment record (used for CRAM).
fn decode_alignment_record(
    rec: &dyn sam::alignment::Record,
    header: &sam::Header,
    refs: &[String],
) -> Result<ReadInfo> {
    let name = rec
        .name()
        .map(|n| String::from_utf8_lossy(n.as_ref()).to_string())
        .unwrap_or_else(|| "*".to_string());

    let ref_id = rec.reference_sequence_id(header).transpose()?;
    let position = match rec.alignment_start() {
        Some(Ok(p)) => (p.get() as i64) - 1,
        Some(Err(e)) => return Err(e.into()),
        None => -1,
    };
    let mate_position = match rec.mate_alignment_start() {
        Some(Ok(p)) => (p.get() as i64) - 1,
        _ => -1,
    };

    let mut ops = Vec::new();
    for op_result in rec.cigar().iter() {
        let op = op_result?;
        ops.push((op.kind(), op.len()));
    }

    let sequence: Vec<u8> = rec.sequence().iter().collect();

    Ok(ReadInfo {
        name,
        reference_name: lookup_name(refs, ref_id),
        position,
        mate_position,
        flag: rec.flags()?.bits(),
        sequence: String::from_utf8_lossy(&sequence).to_string(),
        cigar: format_cigar(&ops),
    })
}

/// Sequential reader over a BAM or CRAM file.
enum Inner {
    Bam(bam::io::Reader<bgzf::io::Reader<BufReader<File>>>),
    Cram(cram::io::Reader<BufReader<File>>),
}

struct AlignmentReader {
    inner: Inner,
    sam_header: sam::Header,
    refs: Vec<String>,
    /// Decoded records of the current CRAM container
    cram_record_buf: VecDeque<ReadInfo>,
    fasta_repo: fasta::Repository,
}

impl AlignmentReader {
    fn open(path: &str, ref_path: Option<&str>) -> Result<Self> {
        let fasta_repo = match ref_path {
            Some(rp) => {
                let indexed_reader = fasta::io::indexed_reader::Builder::default()
                    .build_from_path(rp)
                    .map_err(|e| anyhow::anyhow!("Failed to open FASTA reference {}: {}", rp, e))?;
                let adapter = fasta::repository::adapters::IndexedReader::new(indexed_reader);
                fasta::Repository::new(adapter)
            }
            None => fasta::Repository::default(),
        };

        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open alignment file {}: {}", path, e))?;

        let (inner, sam_header) = if is_cram_file(path) {
            let mut reader = cram::io::reader::Builder::default()
                .set_reference_sequence_repository(fasta_repo.clone())
                .build_from_reader(BufReader::new(file));
            let header = reader.read_header()?;
            (Inner::Cram(reader), header)
        } else {
            let mut reader = bam::io::Reader::new(BufReader::new(file));
            let header = reader.read_header()?;
            (Inner::Bam(reader), header)
        };

        let refs = reference_names(&sam_header);
        Ok(AlignmentReader {
            inner,
            sam_header,
            refs,
            cram_record_buf: VecDeque::new(),
            fasta_repo,
        })
    }

    /// Decode the next CRAM container into the record buffer.
    fn fill_cram_buffer(&mut self) -> Result<()> {
        let Inner::Cram(reader) = &mut self.inner else {
            return Ok(());
        };

        let mut container = cram::io::reader::Container::default();
        if reader.read_container(&mut container)? == 0 {
            return Ok(()); // EOF
        }

        let compression_header = container.compression_header()?;
        for slice_result in container.slices() {
            let slice = slice_result?;
            let (core_data_src, external_data_srcs) = slice.decode_blocks()?;
            let cram_records = slice.records(
                self.fasta_repo.clone(),
                &self.sam_header,
                &compression_header,
                &core_data_src,
                &external_data_srcs,
            )?;
            for cram_rec in &cram_records {
                let read = decode_alignment_record(cram_rec, &self.sam_header, &self.refs)?;
                self.cram_record_buf.push_back(read);
            }
        }
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<ReadInfo>> {
        match &mut self.inner {
            Inner::Bam(reader) => {
                let mut buf = bam::Record::default();
                match reader.read_record(&mut buf)? {
                    0 => Ok(None),
                    _ => Ok(Some(decode_bam_record(&buf, &self.refs)?)),
                }
            }
            Inner::Cram(_) => {
                if self.cram_record_buf.is_empty() {
                    self.fill_cram_buffer()?;
                }
                Ok(self.cram_record_buf.pop_front())
            }
        }
    }
}

/// Detect CRAM by its "CRAM" magic bytes, falling back to the file extension.
pub fn is_cram_file(path: &str) -> bool {
    if let Ok(mut f) = File::open(path) {
        let mut magic = [0u8; 4];
        if std::io::Read::read_exact(&mut f, &mut magic).is_ok() {
            return &magic == b"CRAM";
        }
    }
    path.ends_with(".cram")
}

/// All alignments of a fusion-reads store, loaded once.
#[derive(Debug, Clone)]
pub struct AlignmentStore {
    path: String,
    refs: Vec<String>,
    reads: Vec<ReadInfo>,
    by_name: HashMap<String, Vec<usize>>,
}

impl AlignmentStore {
    /// Load every alignment from a BAM or CRAM file.
    ///
    /// `ref_path` is an indexed FASTA, needed only to decode reference-compressed CRAM.
    pub fn open(path: &str, ref_path: Option<&str>) -> crate::error::Result<Self> {
        Self::load(path, ref_path).map_err(|e| FusionError::Alignment(format!("{}: {}", path, e)))
    }

    fn load(path: &str, ref_path: Option<&str>) -> Result<Self> {
        let mut reader = AlignmentReader::open(path, ref_path)?;
        let mut reads = Vec::new();
        while let Some(read) = reader.read_record()? {
            reads.push(read);
        }
        info!("Loaded {} alignments from {}", reads.len(), path);
        Ok(Self::from_reads(path, reader.refs, reads))
    }

    /// Build a store from already-decoded reads.
    pub fn from_reads(path: &str, refs: Vec<String>, reads: Vec<ReadInfo>) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, read) in reads.iter().enumerate() {
            by_name.entry(read.name.clone()).or_default().push(i);
        }
        AlignmentStore {
            path: path.to_string(),
            refs,
            reads,
            by_name,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reference sequence names from the store header.
    pub fn reference_names(&self) -> &[String] {
        &self.refs
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Alignments in file order.
    pub fn reads(&self) -> &[ReadInfo] {
        &self.reads
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReadInfo> {
        self.reads.iter()
    }

    /// Read name of every alignment, in file order (repeats for split/paired reads).
    pub fn names(&self) -> Vec<&str> {
        self.reads.iter().map(|r| r.name.as_str()).collect()
    }

    /// Number of distinct read names.
    pub fn distinct_names(&self) -> usize {
        self.by_name.len()
    }

    /// All alignments carrying `name`, in file order.
    pub fn get(&self, name: &str) -> Vec<&ReadInfo> {
        self.by_name
            .get(name)
            .map(|idxs| idxs.iter().map(|&i| &self.reads[i]).collect())
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a AlignmentStore {
    type Item = &'a ReadInfo;
    type IntoIter = std::slice::Iter<'a, ReadInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.reads.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles::core::Position;
    use noodles::sam::alignment::io::Write as _;
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::alignment::record::cigar::op::Op;
    use noodles::sam::alignment::record_buf::{Cigar, RecordBuf, Sequence};
    use noodles::sam::header::record::value::Map;
    use noodles::sam::header::record::value::map::ReferenceSequence;
    use std::io::Write;
    use std::num::NonZeroUsize;
    use tempfile::{NamedTempFile, TempDir};

    fn read(name: &str, pos: i64, flag: u16, cigar: &str) -> ReadInfo {
        ReadInfo {
            name: name.to_string(),
            reference_name: Some("chr1".to_string()),
            position: pos,
            mate_position: -1,
            flag,
            sequence: "ACGT".to_string(),
            cigar: cigar.to_string(),
        }
    }

    #[test]
    fn test_format_cigar() {
        let ops = vec![
            (CigarKind::SoftClip, 10),
            (CigarKind::Match, 90),
            (CigarKind::Deletion, 2),
            (CigarKind::SequenceMatch, 5),
        ];
        assert_eq!(format_cigar(&ops), "10S90M2D5=");
        assert_eq!(format_cigar(&[]), "*");
    }

    #[test]
    fn test_store_lookup_by_name() {
        let reads = vec![
            read("r1", 100, 0, "50M50S"),
            read("r2", 300, 0x10, "100M"),
            read("r1", 5000, 0x800, "50H50M"),
        ];
        let store = AlignmentStore::from_reads("fusion_reads.bam", vec!["chr1".to_string()], reads);

        assert_eq!(store.len(), 3);
        assert_eq!(store.distinct_names(), 2);
        assert_eq!(store.names(), vec!["r1", "r2", "r1"]);

        let r1 = store.get("r1");
        assert_eq!(r1.len(), 2);
        assert_eq!(r1[0].position, 100);
        assert!(r1[1].is_supplementary());
        assert!(store.get("r2")[0].is_reverse());
        assert!(store.get("missing").is_empty());
        assert_eq!(store.iter().count(), 3);
    }

    #[test]
    fn test_open_missing_file() {
        let err = AlignmentStore::open("/nonexistent/fusion_reads.bam", None).unwrap_err();
        assert!(matches!(err, FusionError::Alignment(_)));
        assert!(err.to_string().contains("fusion_reads.bam"));
    }

    #[test]
    fn test_open_garbage_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"this is not a BAM file").unwrap();
        let result = AlignmentStore::open(file.path().to_str().unwrap(), None);
        assert!(matches!(result, Err(FusionError::Alignment(_))));
    }

    #[test]
    fn test_cram_detection_by_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"CRAM\x03\x00").unwrap();
        assert!(is_cram_file(file.path().to_str().unwrap()));

        let mut other = NamedTempFile::new().unwrap();
        other.write_all(b"BAM\x01").unwrap();
        assert!(!is_cram_file(other.path().to_str().unwrap()));
        assert!(is_cram_file("/nonexistent/reads.cram"));
    }

    fn write_bam(path: &std::path::Path, records: &[RecordBuf]) {
        let header = sam::Header::builder()
            .add_reference_sequence("chr1", Map::<ReferenceSequence>::new(NonZeroUsize::new(1000).unwrap()))
            .add_reference_sequence("chr9", Map::<ReferenceSequence>::new(NonZeroUsize::new(1000).unwrap()))
            .build();
        let mut writer = bam::io::Writer::new(File::create(path).unwrap());
        writer.write_header(&header).unwrap();
        for record in records {
            writer.write_alignment_record(&header, record).unwrap();
        }
        writer.try_finish().unwrap();
    }

    #[test]
    fn test_open_bam_decodes_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fusion_reads.bam");
        let mapped = RecordBuf::builder()
            .set_name("read1")
            .set_flags(Flags::empty())
            .set_reference_sequence_id(0)
            .set_alignment_start(Position::try_from(101).unwrap())
            .set_cigar(Cigar::from(vec![Op::new(CigarKind::Match, 4)]))
            .set_sequence(Sequence::from(b"ACGT".to_vec()))
            .build();
        let supplementary = RecordBuf::builder()
            .set_name("read1")
            .set_flags(Flags::SUPPLEMENTARY | Flags::REVERSE_COMPLEMENTED)
            .set_reference_sequence_id(1)
            .set_alignment_start(Position::try_from(501).unwrap())
            .set_cigar(Cigar::from(vec![Op::new(CigarKind::SoftClip, 2), Op::new(CigarKind::Match, 2)]))
            .set_sequence(Sequence::from(b"ACGT".to_vec()))
            .build();
        let unmapped = RecordBuf::builder()
            .set_name("read2")
            .set_flags(Flags::UNMAPPED)
            .set_sequence(Sequence::from(b"GGCC".to_vec()))
            .build();
        write_bam(&path, &[mapped, supplementary, unmapped]);

        let store = AlignmentStore::open(path.to_str().unwrap(), None).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.distinct_names(), 2);
        assert_eq!(store.reference_names(), &["chr1".to_string(), "chr9".to_string()]);

        let read1 = store.get("read1");
        assert_eq!(read1[0].reference_name.as_deref(), Some("chr1"));
        assert_eq!(read1[0].position, 100);
        assert_eq!(read1[0].cigar, "4M");
        assert_eq!(read1[0].sequence, "ACGT");
        assert!(!read1[0].is_supplementary());

        assert_eq!(read1[1].reference_name.as_deref(), Some("chr9"));
        assert_eq!(read1[1].position, 500);
        assert_eq!(read1[1].cigar, "2S2M");
        assert!(read1[1].is_supplementary());
        assert!(read1[1].is_reverse());

        let read2 = store.get("read2");
        assert!(read2[0].is_unmapped());
        assert_eq!(read2[0].reference_name, None);
        assert_eq!(read2[0].position, -1);
        assert_eq!(read2[0].cigar, "*");
        assert_eq!(read2[0].sequence, "GGCC");
    }

    #[test]
    fn test_open_empty_bam() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bam");
        write_bam(&path, &[]);
        let store = AlignmentStore::open(path.to_str().unwrap(), None).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.reference_names().len(), 2);
    }
}
