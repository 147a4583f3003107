use crate::types::Pos;
use anyhow::{anyhow, Result};
use rust_htslib::bam::record::{Cigar, Record};

/// One gapless aligned span of a read against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadAlignmentBlock {
    /// 1-based reference position of the first aligned base.
    pub reference_start: Pos,
    /// 0-based index into the read bases of the first aligned base.
    pub read_start: u32,
    pub length: u32,
}

impl ReadAlignmentBlock {
    pub fn reference_end(&self) -> Pos {
        self.reference_start + self.length - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatePosition {
    pub contig: String,
    pub alignment_start: Pos,
}

/// The parts of an alignment record needed to slice it onto transcripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    pub name: String,
    pub contig: String,
    pub alignment_start: Pos,
    pub mate: Option<MatePosition>,
    pub blocks: Vec<ReadAlignmentBlock>,
    pub bases: Vec<u8>,
    pub qualities: Vec<u8>,
}

impl AlignedRead {
    /// Decode a mapped htslib record. `target_names` is the header's contig list.
    ///
    /// Returns `None` for unmapped records.
    pub fn from_record(record: &Record, target_names: &[String]) -> Result<Option<Self>> {
        if record.is_unmapped() || record.tid() < 0 || record.pos() < 0 {
            return Ok(None);
        }
        let contig = contig_name(target_names, record.tid())?;

        let has_mate = record.is_paired()
            && !record.is_mate_unmapped()
            && record.mtid() >= 0
            && record.mpos() >= 0;
        let mate = if has_mate {
            Some(MatePosition {
                contig: contig_name(target_names, record.mtid())?,
                alignment_start: to_one_based(record.mpos())?,
            })
        } else {
            None
        };

        Ok(Some(Self {
            name: String::from_utf8_lossy(record.qname()).to_string(),
            contig,
            alignment_start: to_one_based(record.pos())?,
            mate,
            blocks: alignment_blocks(record)?,
            bases: record.seq().as_bytes(),
            qualities: record.qual().to_vec(),
        }))
    }
}

fn contig_name(target_names: &[String], tid: i32) -> Result<String> {
    usize::try_from(tid)
        .ok()
        .and_then(|i| target_names.get(i))
        .cloned()
        .ok_or_else(|| anyhow!("reference id {} not found in header", tid))
}

fn to_one_based(pos: i64) -> Result<Pos> {
    Pos::try_from(pos + 1).map_err(|_| anyhow!("alignment position out of range: {}", pos))
}

/// Extract gapless aligned blocks from a record's CIGAR.
///
/// `M`, `=` and `X` emit blocks; `I` and `S` consume read bases only;
/// `D` and `N` consume reference bases only; `H` and `P` consume neither.
pub fn alignment_blocks(record: &Record) -> Result<Vec<ReadAlignmentBlock>> {
    if record.is_unmapped() || record.pos() < 0 {
        return Ok(Vec::new());
    }
    // pos() is 0-based; blocks are reported 1-based.
    let mut ref_pos = to_one_based(record.pos())?;
    let mut read_pos: u32 = 0;
    let mut blocks: Vec<ReadAlignmentBlock> = Vec::new();

    for op in record.cigar().iter() {
        match op {
            Cigar::Match(n) | Cigar::Equal(n) | Cigar::Diff(n) => {
                if *n > 0 {
                    blocks.push(ReadAlignmentBlock {
                        reference_start: ref_pos,
                        read_start: read_pos,
                        length: *n,
                    });
                }
                ref_pos = ref_pos.saturating_add(*n);
                read_pos = read_pos.saturating_add(*n);
            }
            Cigar::Ins(n) | Cigar::SoftClip(n) => {
                read_pos = read_pos.saturating_add(*n);
            }
            Cigar::Del(n) | Cigar::RefSkip(n) => {
                ref_pos = ref_pos.saturating_add(*n);
            }
            Cigar::HardClip(_) | Cigar::Pad(_) => {}
        }
    }

    Ok(blocks)
}
