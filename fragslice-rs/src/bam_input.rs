use crate::alignment::AlignedRead;
use crate::region::GenomeRegion;
use anyhow::{Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::Read as HtsRead;
use std::path::{Path, PathBuf};

/// A scoped connection to an alignment file that answers region queries.
///
/// Dropping the source releases the underlying file handle.
pub trait AlignmentSource {
    /// Reads whose alignment overlaps `region`. A contig missing from the
    /// file yields no reads.
    fn query(&mut self, region: &GenomeRegion) -> Result<Vec<AlignedRead>>;
}

/// Opens fresh [`AlignmentSource`]s. Shared between worker threads, so
/// implementations hold only paths and settings.
pub trait AlignmentOpener: Sync {
    type Source: AlignmentSource;

    fn open(&self) -> Result<Self::Source>;
}

/// Opens indexed BAM/CRAM files through htslib.
#[derive(Debug, Clone)]
pub struct HtsOpener {
    pub path: PathBuf,
    /// Reference FASTA, needed to decode CRAM.
    pub reference: Option<PathBuf>,
    pub min_mapping_quality: u8,
}

impl HtsOpener {
    pub fn new(path: &Path, reference: Option<&Path>, min_mapping_quality: u8) -> Self {
        Self {
            path: path.to_path_buf(),
            reference: reference.map(Path::to_path_buf),
            min_mapping_quality,
        }
    }
}

impl AlignmentOpener for HtsOpener {
    type Source = HtsSource;

    fn open(&self) -> Result<HtsSource> {
        let mut reader = bam::IndexedReader::from_path(&self.path)
            .with_context(|| format!("failed to open indexed alignment file {}", self.path.display()))?;
        if let Some(reference) = &self.reference {
            reader
                .set_reference(reference)
                .with_context(|| format!("failed to attach reference {}", reference.display()))?;
        }
        let target_names = reader
            .header()
            .target_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect();
        Ok(HtsSource {
            reader,
            target_names,
            min_mapping_quality: self.min_mapping_quality,
        })
    }
}

pub struct HtsSource {
    reader: bam::IndexedReader,
    target_names: Vec<String>,
    min_mapping_quality: u8,
}

impl AlignmentSource for HtsSource {
    fn query(&mut self, region: &GenomeRegion) -> Result<Vec<AlignedRead>> {
        if !self.target_names.iter().any(|n| *n == region.chromosome) {
            tracing::debug!(region = %region, "contig not present in alignment file");
            return Ok(Vec::new());
        }

        // htslib fetches 0-based half-open intervals.
        let start = i64::from(region.start) - 1;
        let end = i64::from(region.end);
        self.reader
            .fetch((region.chromosome.as_str(), start, end))
            .with_context(|| format!("failed to query {}", region))?;

        let mut reads = Vec::new();
        for result in self.reader.records() {
            let record = result?;
            if record.mapq() < self.min_mapping_quality {
                continue;
            }
            if let Some(read) = AlignedRead::from_record(&record, &self.target_names)? {
                reads.push(read);
            }
        }
        Ok(reads)
    }
}
