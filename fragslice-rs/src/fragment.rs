use crate::alignment::AlignedRead;
use crate::projection::{project_read, ProjectedRead};
use crate::region::GenomeRegion;
use crate::types::Locus;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A base call at one transcript locus. Ordering is by quality, then base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Nucleotide {
    pub quality: u8,
    pub base: u8,
}

/// Every base of one read (both mates share the name) projected into
/// transcript space, possibly across several genes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: String,
    pub genes: BTreeSet<String>,
    pub loci: BTreeMap<Locus, Nucleotide>,
}

impl Fragment {
    pub fn new(id: impl Into<String>, gene: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            genes: BTreeSet::from([gene.into()]),
            loci: BTreeMap::new(),
        }
    }

    /// Union of two fragments of the same read.
    ///
    /// Where both sides call the same locus the higher-quality call wins, ties
    /// broken by base, so merging is associative and commutative.
    pub fn merge(mut self, other: Fragment) -> Fragment {
        debug_assert_eq!(self.id, other.id, "merging fragments of different reads");
        self.genes.extend(other.genes);
        for (locus, nucleotide) in other.loci {
            self.add_nucleotide(locus, nucleotide);
        }
        self
    }

    pub fn add_nucleotide(&mut self, locus: Locus, nucleotide: Nucleotide) {
        self.loci
            .entry(locus)
            .and_modify(|existing| *existing = (*existing).max(nucleotide))
            .or_insert(nucleotide);
    }

    /// Loci whose call reaches `min_quality`.
    pub fn qualified_loci(&self, min_quality: u8) -> impl Iterator<Item = (Locus, u8)> + '_ {
        self.loci
            .iter()
            .filter(move |(_, n)| n.quality >= min_quality)
            .map(|(locus, n)| (*locus, n.base))
    }

    pub fn sequence(&self) -> String {
        self.loci.values().map(|n| n.base as char).collect()
    }
}

/// Builds a fragment from one read overlapping one coding sub-region.
pub trait FragmentFactory {
    fn create_fragment(
        &self,
        read: &Arc<AlignedRead>,
        gene: &str,
        reverse_strand: bool,
        offset: Locus,
        region: &GenomeRegion,
    ) -> Option<Fragment>;
}

/// Default factory: one locus per projected base, complemented on the reverse strand.
#[derive(Debug, Clone, Default)]
pub struct NucleotideFragmentFactory;

impl NucleotideFragmentFactory {
    pub fn fragment_from_projections(projections: &[ProjectedRead]) -> Option<Fragment> {
        let first = projections.first()?;
        let mut fragment = Fragment::new(first.read_id(), first.gene.clone());
        for projection in projections {
            let read = &projection.read;
            for (locus, read_idx) in projection.positions() {
                let Some(&base) = read.bases.get(read_idx) else {
                    continue;
                };
                let quality = base_quality(&read.qualities, read_idx);
                let base = if projection.reverse_strand {
                    complement(base)
                } else {
                    base
                };
                fragment.add_nucleotide(locus, Nucleotide { quality, base });
            }
        }
        Some(fragment)
    }
}

impl FragmentFactory for NucleotideFragmentFactory {
    fn create_fragment(
        &self,
        read: &Arc<AlignedRead>,
        gene: &str,
        reverse_strand: bool,
        offset: Locus,
        region: &GenomeRegion,
    ) -> Option<Fragment> {
        let projections = project_read(read, gene, region, offset, reverse_strand);
        Self::fragment_from_projections(&projections)
    }
}

/// Missing qualities (`*` in SAM, stored as 0xFF by htslib) count as 0 so
/// they never outrank a real call when fragments merge.
fn base_quality(qualities: &[u8], read_idx: usize) -> u8 {
    match qualities.get(read_idx) {
        Some(&MISSING_QUALITY) | None => 0,
        Some(&quality) => quality,
    }
}

const MISSING_QUALITY: u8 = 0xFF;

fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        other => other,
    }
}
