use crate::types::{HashMap, HashMapExt, Pos};
use anyhow::{anyhow, Result};
use coitrees::{BasicCOITree, Interval, IntervalTree as CoitreeIntervalTree};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Blast reports frames as `1` / `-1`.
    pub fn from_frame(frame: i32) -> Option<Self> {
        match frame {
            1 => Some(Strand::Forward),
            -1 => Some(Strand::Reverse),
            _ => None,
        }
    }

    pub fn is_reverse(self) -> bool {
        self == Strand::Reverse
    }
}

/// Genomic interval, 1-based inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomeRegion {
    pub chromosome: String,
    pub start: Pos,
    pub end: Pos,
}

impl GenomeRegion {
    pub fn new(chromosome: impl Into<String>, start: Pos, end: Pos) -> Self {
        Self { chromosome: chromosome.into(), start, end }
    }

    pub fn bases(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn contains(&self, chromosome: &str, pos: Pos) -> bool {
        self.chromosome == chromosome && pos >= self.start && pos <= self.end
    }
}

impl fmt::Display for GenomeRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

/// Per-chromosome interval trees over padded coding regions.
///
/// Used to decide whether a read and its mate both start inside a region of
/// interest. Regions from different transcripts may overlap.
pub struct CodingRegionIndex {
    trees: HashMap<String, BasicCOITree<(), u32>>,
}

impl CodingRegionIndex {
    pub fn build(regions: &[GenomeRegion]) -> Result<Self> {
        let mut intervals: HashMap<String, Vec<Interval<()>>> = HashMap::new();
        for region in regions {
            if region.end < region.start {
                return Err(anyhow!("region {} ends before it starts", region));
            }
            let first = i32::try_from(region.start)
                .map_err(|_| anyhow!("region start out of range: {}", region))?;
            let last = i32::try_from(region.end)
                .map_err(|_| anyhow!("region end out of range: {}", region))?;
            // COITree intervals are end-inclusive, same as GenomeRegion.
            intervals
                .entry(region.chromosome.clone())
                .or_default()
                .push(Interval::new(first, last, ()));
        }

        let trees = intervals
            .into_iter()
            .map(|(chromosome, ivs)| (chromosome, BasicCOITree::new(&ivs)))
            .collect();
        Ok(Self { trees })
    }

    pub fn contains(&self, chromosome: &str, pos: Pos) -> bool {
        let Some(tree) = self.trees.get(chromosome) else {
            return false;
        };
        let Ok(pos) = i32::try_from(pos) else {
            return false;
        };
        tree.query_count(pos, pos) > 0
    }
}
