use crate::region::{GenomeRegion, Strand};
use crate::types::{HashMap, HashMapExt, Pos};
use anyhow::{anyhow, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const CANONICAL_TAG: &str = "Ensembl_canonical";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Gtf,
    Gff3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exon {
    pub start: Pos,
    pub end: Pos,
}

/// A protein-coding transcript, 1-based inclusive coordinates throughout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRegion {
    pub gene: String,
    pub transcript_id: String,
    pub chromosome: String,
    pub strand: Strand,
    pub coding_start: Pos,
    pub coding_end: Pos,
    pub exons: Vec<Exon>,
    /// Tagged `Ensembl_canonical` in the annotation.
    pub canonical: bool,
}

impl TranscriptRegion {
    /// Coding parts of each exon, ascending genomic order.
    ///
    /// A transcript without exons is treated as one exon spanning the coding range.
    pub fn coding_regions(&self) -> Vec<GenomeRegion> {
        if self.exons.is_empty() {
            return vec![GenomeRegion::new(
                self.chromosome.clone(),
                self.coding_start,
                self.coding_end,
            )];
        }

        let mut exons = self.exons.clone();
        exons.sort_by_key(|e| e.start);
        exons
            .iter()
            .filter(|e| e.end >= self.coding_start && e.start <= self.coding_end)
            .map(|e| {
                GenomeRegion::new(
                    self.chromosome.clone(),
                    e.start.max(self.coding_start),
                    e.end.min(self.coding_end),
                )
            })
            .collect()
    }

    /// Coding span widened by `distance` on both sides.
    pub fn padded_coding_region(&self, distance: u32) -> GenomeRegion {
        GenomeRegion::new(
            self.chromosome.clone(),
            self.coding_start.saturating_sub(distance).max(1),
            self.coding_end.saturating_add(distance),
        )
    }

    pub fn coding_bases(&self) -> u32 {
        self.coding_regions().iter().map(GenomeRegion::bases).sum()
    }
}

pub fn detect_format(path: &Path) -> Result<InputFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "gtf" => Ok(InputFormat::Gtf),
        "gff" | "gff3" => Ok(InputFormat::Gff3),
        _ => Err(anyhow!(
            "unable to detect annotation format from extension: .{}",
            ext
        )),
    }
}

/// Load coding transcripts from GTF/GFF3.
///
/// `exon` features contribute exons and `CDS` features widen the coding span.
/// Transcripts that never see a `CDS` feature are dropped. Output is sorted by
/// gene then transcript id so repeated loads are stable.
pub fn load_transcripts(path: &Path) -> Result<Vec<TranscriptRegion>> {
    let builders = match detect_format(path)? {
        InputFormat::Gtf => load_gtf(path)?,
        InputFormat::Gff3 => load_gff3(path)?,
    };

    let mut transcripts: Vec<TranscriptRegion> =
        builders.into_values().filter_map(TranscriptBuilder::finish).collect();
    transcripts.sort_by(|a, b| (&a.gene, &a.transcript_id).cmp(&(&b.gene, &b.transcript_id)));
    Ok(transcripts)
}

/// One transcript per listed gene, in the order genes are listed.
///
/// Genes without a coding transcript are skipped. See [`canonical_transcripts`]
/// for how the transcript is chosen.
pub fn select_genes(transcripts: &[TranscriptRegion], genes: &[String]) -> Vec<TranscriptRegion> {
    genes
        .iter()
        .filter_map(|gene| {
            transcripts
                .iter()
                .filter(|t| &t.gene == gene)
                .max_by(|a, b| preference(a, b))
        })
        .cloned()
        .collect()
}

/// One transcript per gene, sorted by gene.
///
/// Isoforms of a gene have unrelated transcript coordinates, so only one may
/// feed a slice. The `Ensembl_canonical` transcript wins, then the one with
/// the most coding bases, then the lowest transcript id.
pub fn canonical_transcripts(transcripts: &[TranscriptRegion]) -> Vec<TranscriptRegion> {
    let mut by_gene: BTreeMap<&str, &TranscriptRegion> = BTreeMap::new();
    for transcript in transcripts {
        by_gene
            .entry(transcript.gene.as_str())
            .and_modify(|best| {
                if preference(transcript, *best) == Ordering::Greater {
                    *best = transcript;
                }
            })
            .or_insert(transcript);
    }
    by_gene.into_values().cloned().collect()
}

fn preference(a: &TranscriptRegion, b: &TranscriptRegion) -> Ordering {
    a.canonical
        .cmp(&b.canonical)
        .then_with(|| a.coding_bases().cmp(&b.coding_bases()))
        .then_with(|| b.transcript_id.cmp(&a.transcript_id))
}

#[derive(Debug)]
struct TranscriptBuilder {
    gene: Option<String>,
    transcript_id: String,
    chromosome: String,
    strand: Option<Strand>,
    coding: Option<(Pos, Pos)>,
    exons: Vec<Exon>,
    canonical: bool,
}

impl TranscriptBuilder {
    fn new(transcript_id: String, chromosome: String, strand: Option<Strand>) -> Self {
        Self {
            gene: None,
            transcript_id,
            chromosome,
            strand,
            coding: None,
            exons: Vec::new(),
            canonical: false,
        }
    }

    fn add_feature(&mut self, feature_type: &[u8], start: Pos, end: Pos) {
        match feature_type {
            b"exon" => self.exons.push(Exon { start, end }),
            b"CDS" => {
                self.coding = Some(match self.coding {
                    Some((s, e)) => (s.min(start), e.max(end)),
                    None => (start, end),
                });
            }
            _ => {}
        }
    }

    fn finish(self) -> Option<TranscriptRegion> {
        let (coding_start, coding_end) = self.coding?;
        Some(TranscriptRegion {
            gene: self.gene.unwrap_or_else(|| self.transcript_id.clone()),
            transcript_id: self.transcript_id,
            chromosome: self.chromosome,
            strand: self.strand?,
            coding_start,
            coding_end,
            exons: self.exons,
            canonical: self.canonical,
        })
    }
}

fn feature_bounds(start: usize, end: usize, format: &str) -> Result<(Pos, Pos)> {
    let start = Pos::try_from(start).map_err(|_| anyhow!("{} start out of range", format))?;
    let end = Pos::try_from(end).map_err(|_| anyhow!("{} end out of range", format))?;
    Ok((start, end))
}

fn load_gtf(path: &Path) -> Result<HashMap<String, TranscriptBuilder>> {
    let reader = File::open(path)?;
    let mut reader = noodles::gtf::io::Reader::new(BufReader::new(reader));

    let mut transcripts: HashMap<String, TranscriptBuilder> = HashMap::new();

    for result in reader.record_bufs() {
        let record = result?;

        let feature_type: &[u8] = record.ty().as_ref();
        if feature_type != b"transcript" && feature_type != b"exon" && feature_type != b"CDS" {
            continue;
        }

        let (start, end) = feature_bounds(record.start().get(), record.end().get(), "GTF")?;

        let attrs = record.attributes();
        let transcript_id = get_record_buf_attribute(attrs, b"transcript_id")
            .ok_or_else(|| anyhow!("missing transcript_id in GTF attributes"))?;
        let gene = get_record_buf_attribute(attrs, b"gene_name")
            .or_else(|| get_record_buf_attribute(attrs, b"gene_id"));

        let entry = transcripts.entry(transcript_id.clone()).or_insert_with(|| {
            TranscriptBuilder::new(
                transcript_id,
                record.reference_sequence_name().to_string(),
                convert_strand(record.strand()),
            )
        });
        if entry.gene.is_none() {
            entry.gene = gene;
        }
        entry.canonical |= has_attribute_value(attrs, b"tag", CANONICAL_TAG);
        entry.add_feature(feature_type, start, end);
    }

    Ok(transcripts)
}

fn load_gff3(path: &Path) -> Result<HashMap<String, TranscriptBuilder>> {
    let reader = File::open(path)?;
    let mut reader = noodles::gff::io::Reader::new(BufReader::new(reader));

    let mut transcripts: HashMap<String, TranscriptBuilder> = HashMap::new();

    for result in reader.record_bufs() {
        let record = result?;

        let feature_type: &[u8] = record.ty().as_ref();
        let is_transcript = feature_type == b"transcript" || feature_type == b"mRNA";
        if !is_transcript && feature_type != b"exon" && feature_type != b"CDS" {
            continue;
        }

        let (start, end) = feature_bounds(record.start().get(), record.end().get(), "GFF3")?;

        let attrs = record.attributes();
        let transcript_id = if is_transcript {
            get_record_buf_attribute(attrs, b"ID")
        } else {
            get_record_buf_attribute(attrs, b"Parent")
        }
        .ok_or_else(|| anyhow!("missing transcript id in GFF3 attributes"))?;
        let gene = get_record_buf_attribute(attrs, b"gene_name")
            .or_else(|| get_record_buf_attribute(attrs, b"Name"));

        let entry = transcripts.entry(transcript_id.clone()).or_insert_with(|| {
            TranscriptBuilder::new(
                transcript_id,
                record.reference_sequence_name().to_string(),
                convert_strand(record.strand()),
            )
        });
        // Only the transcript feature names the gene; exon/CDS names are per-feature.
        if is_transcript {
            entry.gene = gene.or(entry.gene.take());
            entry.canonical |= has_attribute_value(attrs, b"tag", CANONICAL_TAG);
        }
        entry.add_feature(feature_type, start, end);
    }

    Ok(transcripts)
}

fn get_record_buf_attribute(
    attrs: &noodles::gff::feature::record_buf::Attributes,
    key: &[u8],
) -> Option<String> {
    let value = attrs.get(key)?;
    value.iter().next().map(|v| v.to_string())
}

fn has_attribute_value(
    attrs: &noodles::gff::feature::record_buf::Attributes,
    key: &[u8],
    expected: &str,
) -> bool {
    attrs
        .get(key)
        .is_some_and(|value| value.iter().any(|v| v.to_string() == expected))
}

fn convert_strand(strand: noodles::gff::feature::record::Strand) -> Option<Strand> {
    use noodles::gff::feature::record::Strand as GffStrand;
    match strand {
        GffStrand::Forward => Some(Strand::Forward),
        GffStrand::Reverse => Some(Strand::Reverse),
        GffStrand::None | GffStrand::Unknown => None,
    }
}
