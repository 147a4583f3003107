use crate::alignment::AlignedRead;
use crate::annotation::TranscriptRegion;
use crate::bam_input::{AlignmentOpener, AlignmentSource, HtsOpener};
use crate::fragment::{Fragment, FragmentFactory};
use crate::region::{CodingRegionIndex, GenomeRegion};
use crate::types::{HashMap, HashMapExt, Locus};
use anyhow::{anyhow, Result};
use crossfire::mpmc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::Span;

pub const DEFAULT_MAX_DISTANCE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct SliceConfig {
    /// Padding added to both ends of each transcript's coding span for the
    /// read/mate range check.
    pub max_distance: u32,
    /// Reference FASTA attached to every reader (required for CRAM).
    pub reference: Option<PathBuf>,
    pub min_mapping_quality: u8,
    pub threads: usize,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            reference: None,
            min_mapping_quality: 1,
            threads: 1,
        }
    }
}

#[derive(Debug, Default)]
pub struct SliceStats {
    pub sub_regions: u64,
    pub reads_queried: u64,
    pub reads_out_of_range: u64,
    pub fragments_created: u64,
}

impl SliceStats {
    fn absorb(&mut self, other: &SliceStats) {
        self.sub_regions += other.sub_regions;
        self.reads_queried += other.reads_queried;
        self.reads_out_of_range += other.reads_out_of_range;
        self.fragments_created += other.fragments_created;
    }
}

/// Slices reads overlapping a set of transcripts and re-expresses them in
/// each transcript's coding coordinates.
pub struct RegionAlignmentProjector<F> {
    config: SliceConfig,
    transcripts: Vec<TranscriptRegion>,
    coding_index: CodingRegionIndex,
    factory: F,
    span: Span,
}

impl<F: FragmentFactory + Sync> RegionAlignmentProjector<F> {
    pub fn new(config: SliceConfig, transcripts: Vec<TranscriptRegion>, factory: F) -> Result<Self> {
        let padded: Vec<GenomeRegion> = transcripts
            .iter()
            .map(|t| t.padded_coding_region(config.max_distance))
            .collect();
        let coding_index = CodingRegionIndex::build(&padded)?;
        Ok(Self {
            config,
            transcripts,
            coding_index,
            factory,
            span: tracing::info_span!("slice"),
        })
    }

    /// Emit events inside `span` instead of the default `slice` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn transcripts(&self) -> &[TranscriptRegion] {
        &self.transcripts
    }

    pub fn read_from_bam(&self, path: &Path) -> Result<Vec<Fragment>> {
        let opener = HtsOpener::new(
            path,
            self.config.reference.as_deref(),
            self.config.min_mapping_quality,
        );
        self.read_from_source(&opener)
    }

    /// One merged fragment per read name, sorted by name.
    pub fn read_from_source<O: AlignmentOpener>(&self, opener: &O) -> Result<Vec<Fragment>> {
        let _entered = self.span.enter();
        if self.transcripts.is_empty() {
            return Ok(Vec::new());
        }

        let (fragments, stats) = if self.config.threads > 1 && self.transcripts.len() > 1 {
            self.read_parallel(opener)?
        } else {
            let mut stats = SliceStats::default();
            let mut fragments = Vec::new();
            for transcript in &self.transcripts {
                fragments.extend(self.read_transcript(transcript, opener, &mut stats)?);
            }
            (fragments, stats)
        };

        let merged = merge_fragments(fragments);
        tracing::info!(
            sub_regions = stats.sub_regions,
            reads_queried = stats.reads_queried,
            reads_out_of_range = stats.reads_out_of_range,
            fragments_created = stats.fragments_created,
            fragments = merged.len(),
            "slicing complete"
        );
        Ok(merged)
    }

    fn read_parallel<O: AlignmentOpener>(&self, opener: &O) -> Result<(Vec<Fragment>, SliceStats)> {
        crossfire::detect_backoff_cfg();
        let worker_count = self.config.threads.min(self.transcripts.len());
        // Capacity covers every transcript so the producer never blocks on dead workers.
        let (tx_work, rx_work) = mpmc::bounded_blocking::<usize>(self.transcripts.len());
        for idx in 0..self.transcripts.len() {
            tx_work
                .send(idx)
                .map_err(|_| anyhow!("transcript work queue closed"))?;
        }
        drop(tx_work);

        let span = &self.span;
        thread::scope(|scope| -> Result<(Vec<Fragment>, SliceStats)> {
            let handles: Vec<_> = (0..worker_count)
                .map(|_| {
                    let rx_work = rx_work.clone();
                    scope.spawn(move || -> Result<(Vec<Fragment>, SliceStats)> {
                        let _entered = span.enter();
                        let mut stats = SliceStats::default();
                        let mut fragments = Vec::new();
                        while let Ok(idx) = rx_work.recv() {
                            let transcript = &self.transcripts[idx];
                            fragments.extend(self.read_transcript(transcript, opener, &mut stats)?);
                        }
                        Ok((fragments, stats))
                    })
                })
                .collect();

            let mut fragments = Vec::new();
            let mut stats = SliceStats::default();
            for handle in handles {
                let (worker_fragments, worker_stats) = handle
                    .join()
                    .map_err(|_| anyhow!("slice worker panicked"))??;
                fragments.extend(worker_fragments);
                stats.absorb(&worker_stats);
            }
            Ok((fragments, stats))
        })
    }

    fn read_transcript<O: AlignmentOpener>(
        &self,
        transcript: &TranscriptRegion,
        opener: &O,
        stats: &mut SliceStats,
    ) -> Result<Vec<Fragment>> {
        tracing::info!(
            "... querying {} {} ({}:{}-{}, {} coding bases)",
            transcript.gene,
            transcript.transcript_id,
            transcript.chromosome,
            transcript.coding_start,
            transcript.coding_end,
            transcript.coding_bases()
        );

        let reverse_strand = transcript.strand.is_reverse();
        let mut regions = transcript.coding_regions();
        if reverse_strand {
            regions.reverse();
        }

        let mut fragments = Vec::new();
        let mut offset: Locus = 0;
        for region in &regions {
            fragments.extend(self.realign(opener, transcript, region, offset, reverse_strand, stats)?);
            offset += region.bases();
        }
        Ok(fragments)
    }

    fn realign<O: AlignmentOpener>(
        &self,
        opener: &O,
        transcript: &TranscriptRegion,
        region: &GenomeRegion,
        offset: Locus,
        reverse_strand: bool,
        stats: &mut SliceStats,
    ) -> Result<Vec<Fragment>> {
        stats.sub_regions += 1;
        let reads = {
            let mut source = opener.open()?;
            source.query(region)?
        };
        stats.reads_queried += reads.len() as u64;

        let mut fragments = Vec::new();
        for read in reads {
            if !self.both_ends_in_range(&read) {
                stats.reads_out_of_range += 1;
                continue;
            }
            let read = Arc::new(read);
            let fragment =
                self.factory
                    .create_fragment(&read, &transcript.gene, reverse_strand, offset, region);
            fragments.extend(fragment);
        }
        stats.fragments_created += fragments.len() as u64;
        tracing::debug!(region = %region, offset, fragments = fragments.len(), "realigned sub-region");
        Ok(fragments)
    }

    /// Both the read and its mate must start inside a padded coding region on
    /// the read's own contig.
    fn both_ends_in_range(&self, read: &AlignedRead) -> bool {
        let this_in_range = self.coding_index.contains(&read.contig, read.alignment_start);
        let mate_in_range = read.mate.as_ref().is_some_and(|mate| {
            mate.contig == read.contig && self.coding_index.contains(&read.contig, mate.alignment_start)
        });
        this_in_range && mate_in_range
    }
}

/// Group fragments by read id and merge each group; output sorted by id.
pub fn merge_fragments(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut by_id: HashMap<String, Fragment> = HashMap::new();
    for fragment in fragments {
        match by_id.remove(&fragment.id) {
            Some(existing) => {
                let merged = existing.merge(fragment);
                by_id.insert(merged.id.clone(), merged);
            }
            None => {
                by_id.insert(fragment.id.clone(), fragment);
            }
        }
    }
    let mut merged: Vec<Fragment> = by_id.into_values().collect();
    merged.sort_by(|a, b| a.id.cmp(&b.id));
    merged
}
