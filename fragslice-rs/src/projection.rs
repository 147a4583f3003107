use crate::alignment::{AlignedRead, ReadAlignmentBlock};
use crate::region::GenomeRegion;
use crate::types::Locus;
use std::sync::Arc;

/// One alignment block re-expressed in transcript coordinates.
#[derive(Debug, Clone)]
pub struct ProjectedRead {
    pub gene: String,
    /// 0-based locus of the first projected base in transcript space.
    pub transcript_start: Locus,
    /// Read index of the base that lands on `transcript_start`.
    pub read_index: u32,
    pub length: u32,
    /// When set, read indices walk backwards as loci increase.
    pub reverse_strand: bool,
    pub read: Arc<AlignedRead>,
}

impl ProjectedRead {
    pub fn read_id(&self) -> &str {
        &self.read.name
    }

    /// `(locus, read index)` for every projected base.
    pub fn positions(&self) -> impl Iterator<Item = (Locus, usize)> + '_ {
        (0..self.length).map(move |i| {
            let read_idx = if self.reverse_strand {
                self.read_index - i
            } else {
                self.read_index + i
            };
            (self.transcript_start + i, read_idx as usize)
        })
    }
}

/// Overlap of a block with a sub-region, expressed in transcript space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockProjection {
    pub transcript_start: Locus,
    pub read_index: u32,
    pub length: u32,
}

/// Project one alignment block onto a coding sub-region.
///
/// Transcript space runs from the sub-region's low end on the forward strand
/// and from its high end on the reverse strand. `offset` is the number of
/// coding bases that precede this sub-region in transcript order. Returns
/// `None` when the block does not touch the sub-region.
pub fn project_block(
    block: &ReadAlignmentBlock,
    region: &GenomeRegion,
    offset: Locus,
    reverse_strand: bool,
) -> Option<BlockProjection> {
    if block.length == 0 {
        return None;
    }
    let overlap_start = block.reference_start.max(region.start);
    let overlap_end = block.reference_end().min(region.end);
    if overlap_start > overlap_end {
        return None;
    }

    // The anchor is the overlap base nearest the transcript's start.
    let (anchor, distance_from_origin) = if reverse_strand {
        (overlap_end, region.end - overlap_end)
    } else {
        (overlap_start, overlap_start - region.start)
    };

    Some(BlockProjection {
        transcript_start: distance_from_origin + offset,
        read_index: block.read_start + (anchor - block.reference_start),
        length: overlap_end - overlap_start + 1,
    })
}

/// Project every block of `read` that touches `region`.
pub fn project_read(
    read: &Arc<AlignedRead>,
    gene: &str,
    region: &GenomeRegion,
    offset: Locus,
    reverse_strand: bool,
) -> Vec<ProjectedRead> {
    if read.contig != region.chromosome {
        return Vec::new();
    }
    read.blocks
        .iter()
        .filter_map(|block| project_block(block, region, offset, reverse_strand))
        .map(|p| ProjectedRead {
            gene: gene.to_string(),
            transcript_start: p.transcript_start,
            read_index: p.read_index,
            length: p.length,
            reverse_strand,
            read: Arc::clone(read),
        })
        .collect()
}
