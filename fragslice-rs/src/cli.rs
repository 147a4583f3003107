use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fragslice-rs",
    about = "Slice reads onto transcript coordinates and run batched blastn searches",
    version
)]
pub struct Args {
    /// Set logging level to WARN
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Project reads overlapping coding transcripts into transcript space
    Slice(SliceArgs),
    /// Run blastn over a FASTA of integer-labelled query sequences
    Blastn(BlastnArgs),
}

#[derive(ClapArgs, Debug)]
pub struct SliceArgs {
    /// Input indexed BAM/CRAM with genomic alignments
    pub in_bam: PathBuf,

    /// Reference annotation with exon and CDS features (GTF/GFF)
    #[arg(short = 'G', long = "guide", value_name = "GTF/GFF")]
    pub guide_gff: PathBuf,

    /// Gene names to slice (repeatable); all coding transcripts when omitted
    #[arg(short = 'g', long = "gene")]
    pub genes: Vec<String>,

    /// Padding around each coding span for the read/mate range check
    #[arg(long, default_value_t = fragslice_rs::slicer::DEFAULT_MAX_DISTANCE)]
    pub max_distance: u32,

    /// Minimum mapping quality of sliced reads
    #[arg(long, default_value_t = 1)]
    pub min_mapq: u8,

    /// Genome sequence FASTA (required for CRAM)
    #[arg(short = 'S', long = "genome", value_name = "FASTA")]
    pub genome_fasta: Option<PathBuf>,

    /// Number of threads (CPUs) to use
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: usize,
}

#[derive(ClapArgs, Debug)]
pub struct BlastnArgs {
    /// Query FASTA; headers must be integer ids
    pub query_fasta: PathBuf,

    /// Sample id used to name the query and result files
    #[arg(long)]
    pub sample: String,

    /// BLAST+ install directory (containing bin/blastn)
    #[arg(long, value_name = "DIR")]
    pub blast_dir: PathBuf,

    /// Directory holding the blast database, exported as BLASTDB
    #[arg(long, value_name = "DIR")]
    pub blast_db: PathBuf,

    /// Database name passed to -db
    #[arg(long, default_value = fragslice_rs::blastn::DEFAULT_DB_NAME)]
    pub db_name: String,

    /// Directory for the query FASTA and result table
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Expected value cutoff
    #[arg(long, default_value_t = fragslice_rs::blastn::DEFAULT_EXPECTED_VALUE_CUTOFF)]
    pub evalue: f64,

    /// Number of threads blastn may use
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: usize,
}
