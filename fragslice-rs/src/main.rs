mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Args, BlastnArgs, Command, SliceArgs};
use fragslice_rs::annotation;
use fragslice_rs::blastn::{BlastnConfig, BlastnRunner};
use fragslice_rs::fasta;
use fragslice_rs::fragment::NucleotideFragmentFactory;
use fragslice_rs::slicer::{RegionAlignmentProjector, SliceConfig};
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            if args.quiet {
                EnvFilter::new("warn")
            } else {
                EnvFilter::new("info")
            }
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match &args.command {
        Command::Slice(slice_args) => slice(slice_args),
        Command::Blastn(blastn_args) => blastn(blastn_args),
    }
}

fn slice(args: &SliceArgs) -> Result<()> {
    let transcripts = annotation::load_transcripts(&args.guide_gff)?;
    let transcripts = if args.genes.is_empty() {
        annotation::canonical_transcripts(&transcripts)
    } else {
        annotation::select_genes(&transcripts, &args.genes)
    };

    let config = SliceConfig {
        max_distance: args.max_distance,
        reference: args.genome_fasta.clone(),
        min_mapping_quality: args.min_mapq,
        threads: args.threads,
    };
    let projector = RegionAlignmentProjector::new(config, transcripts, NucleotideFragmentFactory)?;
    let fragments = projector.read_from_bam(&args.in_bam)?;

    let loci: usize = fragments.iter().map(|f| f.loci.len()).sum();
    tracing::info!(
        transcripts = projector.transcripts().len(),
        fragments = fragments.len(),
        loci,
        "fragslice-rs: slicing complete"
    );
    Ok(())
}

fn blastn(args: &BlastnArgs) -> Result<()> {
    let sequences = fasta::load_query_sequences(&args.query_fasta)?;

    let mut config = BlastnConfig::new(&args.blast_dir, &args.blast_db, &args.output_dir);
    config.db_name = args.db_name.clone();
    config.num_threads = args.threads;
    config.expected_value_cutoff = args.evalue;

    let span = tracing::info_span!("blastn", sample = %args.sample);
    let matches = BlastnRunner::new(config).with_span(span).run(&args.sample, &sequences)?;

    let hits: usize = matches.values().map(Vec::len).sum();
    tracing::info!(
        queries = sequences.len(),
        matched_queries = matches.len(),
        hits,
        "fragslice-rs: blastn complete"
    );
    Ok(())
}
