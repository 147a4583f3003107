use fragslice_rs::annotation::{
    canonical_transcripts, detect_format, load_transcripts, select_genes, Exon, InputFormat,
    TranscriptRegion,
};
use fragslice_rs::region::{GenomeRegion, Strand};
use std::fs;
use std::path::Path;

const GTF: &str = "\
chr6\ttest\ttranscript\t1000\t2000\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; gene_name \"HLA-A\";
chr6\ttest\texon\t1000\t1200\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; gene_name \"HLA-A\";
chr6\ttest\texon\t1500\t2000\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; gene_name \"HLA-A\";
chr6\ttest\tCDS\t1100\t1200\t.\t+\t0\tgene_id \"G1\"; transcript_id \"T1\"; gene_name \"HLA-A\";
chr6\ttest\tCDS\t1500\t1900\t.\t+\t2\tgene_id \"G1\"; transcript_id \"T1\"; gene_name \"HLA-A\";
chr6\ttest\ttranscript\t5000\t6000\t.\t-\t.\tgene_id \"G2\"; transcript_id \"T2\"; gene_name \"HLA-B\";
chr6\ttest\texon\t5000\t6000\t.\t-\t.\tgene_id \"G2\"; transcript_id \"T2\"; gene_name \"HLA-B\";
chr6\ttest\tCDS\t5100\t5900\t.\t-\t0\tgene_id \"G2\"; transcript_id \"T2\"; gene_name \"HLA-B\";
chr6\ttest\ttranscript\t8000\t9000\t.\t+\t.\tgene_id \"G3\"; transcript_id \"T3\"; gene_name \"HLA-L\";
chr6\ttest\texon\t8000\t9000\t.\t+\t.\tgene_id \"G3\"; transcript_id \"T3\"; gene_name \"HLA-L\";
";

fn write_gtf(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("genes.gtf");
    fs::write(&path, GTF).unwrap();
    path
}

#[test]
fn loads_coding_transcripts_from_gtf() {
    let dir = tempfile::tempdir().unwrap();
    let transcripts = load_transcripts(&write_gtf(dir.path())).unwrap();

    // T3 has no CDS and is dropped.
    assert_eq!(transcripts.len(), 2);

    let a = &transcripts[0];
    assert_eq!(a.gene, "HLA-A");
    assert_eq!(a.transcript_id, "T1");
    assert_eq!(a.chromosome, "chr6");
    assert_eq!(a.strand, Strand::Forward);
    assert_eq!((a.coding_start, a.coding_end), (1100, 1900));
    assert_eq!(
        a.coding_regions(),
        vec![GenomeRegion::new("chr6", 1100, 1200), GenomeRegion::new("chr6", 1500, 1900)]
    );
    assert_eq!(a.coding_bases(), 101 + 401);

    let b = &transcripts[1];
    assert_eq!(b.gene, "HLA-B");
    assert_eq!(b.strand, Strand::Reverse);
    assert_eq!(b.coding_regions(), vec![GenomeRegion::new("chr6", 5100, 5900)]);
}

#[test]
fn selects_genes_in_requested_order() {
    let dir = tempfile::tempdir().unwrap();
    let transcripts = load_transcripts(&write_gtf(dir.path())).unwrap();

    let selected = select_genes(&transcripts, &["HLA-B".to_string(), "HLA-A".to_string(), "HLA-Z".to_string()]);
    let genes: Vec<&str> = selected.iter().map(|t| t.gene.as_str()).collect();
    assert_eq!(genes, vec!["HLA-B", "HLA-A"]);
}

#[test]
fn detects_format_from_extension() {
    assert_eq!(detect_format(Path::new("a.gtf")).unwrap(), InputFormat::Gtf);
    assert_eq!(detect_format(Path::new("a.GFF3")).unwrap(), InputFormat::Gff3);
    assert!(detect_format(Path::new("a.bed")).is_err());
}

fn region(exons: &[(u32, u32)], coding_start: u32, coding_end: u32) -> TranscriptRegion {
    TranscriptRegion {
        gene: "HLA-C".to_string(),
        transcript_id: "T9".to_string(),
        chromosome: "chr6".to_string(),
        strand: Strand::Forward,
        coding_start,
        coding_end,
        exons: exons.iter().map(|&(start, end)| Exon { start, end }).collect(),
        canonical: false,
    }
}

#[test]
fn coding_regions_skip_untranslated_exons() {
    // Unsorted input; first and last exons are entirely UTR.
    let t = region(&[(700, 800), (100, 150), (300, 400), (500, 600)], 320, 550);
    assert_eq!(
        t.coding_regions(),
        vec![GenomeRegion::new("chr6", 320, 400), GenomeRegion::new("chr6", 500, 550)]
    );
}

#[test]
fn coding_regions_without_exons_use_coding_span() {
    let t = region(&[], 320, 550);
    assert_eq!(t.coding_regions(), vec![GenomeRegion::new("chr6", 320, 550)]);
}

#[test]
fn padding_saturates_at_first_base() {
    let t = region(&[], 300, 550);
    assert_eq!(t.padded_coding_region(1000), GenomeRegion::new("chr6", 1, 1550));
    assert_eq!(t.padded_coding_region(100), GenomeRegion::new("chr6", 200, 650));
}

/// HLA-A with a long isoform T1 and a shorter isoform T2 sharing its last exon.
fn isoform_gtf(canonical_tag_on_short: bool) -> String {
    let a1 = "gene_id \"G1\"; transcript_id \"T1\"; gene_name \"HLA-A\";";
    let a2 = if canonical_tag_on_short {
        "gene_id \"G1\"; transcript_id \"T2\"; gene_name \"HLA-A\"; tag \"Ensembl_canonical\";"
    } else {
        "gene_id \"G1\"; transcript_id \"T2\"; gene_name \"HLA-A\";"
    };
    let b = "gene_id \"G2\"; transcript_id \"T3\"; gene_name \"HLA-B\";";
    [
        format!("chr6\ttest\texon\t100\t199\t.\t+\t.\t{a1}"),
        format!("chr6\ttest\texon\t300\t399\t.\t+\t.\t{a1}"),
        format!("chr6\ttest\tCDS\t100\t199\t.\t+\t0\t{a1}"),
        format!("chr6\ttest\tCDS\t300\t399\t.\t+\t2\t{a1}"),
        format!("chr6\ttest\texon\t300\t399\t.\t+\t.\t{a2}"),
        format!("chr6\ttest\tCDS\t300\t399\t.\t+\t0\t{a2}"),
        format!("chr6\ttest\texon\t5000\t5100\t.\t-\t.\t{b}"),
        format!("chr6\ttest\tCDS\t5000\t5100\t.\t-\t0\t{b}"),
    ]
    .join("\n")
        + "\n"
}

fn load_isoforms(canonical_tag_on_short: bool) -> Vec<TranscriptRegion> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("isoforms.gtf");
    fs::write(&path, isoform_gtf(canonical_tag_on_short)).unwrap();
    load_transcripts(&path).unwrap()
}

#[test]
fn select_genes_keeps_one_isoform_per_gene() {
    let transcripts = load_isoforms(false);
    assert_eq!(transcripts.iter().filter(|t| t.gene == "HLA-A").count(), 2);

    let selected = select_genes(&transcripts, &["HLA-A".to_string()]);
    assert_eq!(selected.len(), 1);
    // Without a canonical tag the longest coding sequence wins.
    assert_eq!(selected[0].transcript_id, "T1");
    assert_eq!(selected[0].coding_bases(), 200);
}

#[test]
fn canonical_tag_beats_longer_isoform() {
    let transcripts = load_isoforms(true);
    let t2 = transcripts.iter().find(|t| t.transcript_id == "T2").unwrap();
    assert!(t2.canonical);

    let selected = select_genes(&transcripts, &["HLA-A".to_string()]);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].transcript_id, "T2");
}

#[test]
fn canonical_transcripts_picks_one_per_gene() {
    let ids: Vec<String> = canonical_transcripts(&load_isoforms(false))
        .into_iter()
        .map(|t| t.transcript_id)
        .collect();
    assert_eq!(ids, vec!["T1", "T3"]);

    let ids: Vec<String> = canonical_transcripts(&load_isoforms(true))
        .into_iter()
        .map(|t| t.transcript_id)
        .collect();
    assert_eq!(ids, vec!["T2", "T3"]);
}

#[test]
fn equal_isoforms_resolve_to_lowest_id() {
    let mut a = region(&[(100, 199)], 100, 199);
    a.transcript_id = "T8".to_string();
    let mut b = a.clone();
    b.transcript_id = "T7".to_string();

    let selected = select_genes(&[a, b], &["HLA-C".to_string()]);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].transcript_id, "T7");
}
