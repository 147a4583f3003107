//! Batch runner for NCBI `blastn` over short query sequences.
//!
//! Queries are written to a FASTA file, `blastn` is run once over the whole
//! batch with tabular output (`-outfmt 6`) and the table is parsed back into
//! [`BlastnMatch`] records grouped by query id.
//!
//! The scoring scheme (match 1, mismatch -4, gap open -5, gap extend -2)
//! favours short, near-identical hits over longer hits with more mismatches.
//! With an e-value cutoff of 1 the shortest reportable hit is about 20 bases.

use crate::region::Strand;
use crate::types::{HashMap, HashMapExt, QueryId};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;
use thiserror::Error;
use tracing::Span;

pub const MATCH_SCORE: i32 = 1;
pub const MISMATCH_SCORE: i32 = -4;
pub const GAP_OPENING_SCORE: i32 = -5;
pub const GAP_EXTEND_SCORE: i32 = -2;
pub const WORD_SIZE: u32 = 9;

pub const DEFAULT_DB_NAME: &str = "GCF_000001405.39_top_level";
pub const DEFAULT_EXPECTED_VALUE_CUTOFF: f64 = 1.0;

/// Environment variable `blastn` reads the database directory from.
pub const BLASTDB_ENV: &str = "BLASTDB";

#[derive(Debug, Error)]
pub enum BlastnError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("blastn exited with {status}")]
    ToolFailed { status: ExitStatus },

    #[error("{path}:{line}: invalid value '{value}' in column {column}")]
    Parse {
        path: PathBuf,
        line: usize,
        column: &'static str,
        value: String,
    },

    #[error("{path}:{line}: expected {expected} columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// Value type of one output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Text,
    /// A frame of `1` or `-1`.
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlastColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> BlastColumn {
    BlastColumn { name, kind }
}

/// Requested `-outfmt 6` columns, in output order.
pub const BLAST_COLUMNS: [BlastColumn; 19] = [
    column("qseqid", ColumnKind::Int),
    column("qlen", ColumnKind::Int),
    column("sseqid", ColumnKind::Text),
    column("stitle", ColumnKind::Text),
    column("pident", ColumnKind::Float),
    column("qcovs", ColumnKind::Float),
    column("length", ColumnKind::Int),
    column("mismatch", ColumnKind::Int),
    column("gapopen", ColumnKind::Int),
    column("qstart", ColumnKind::Int),
    column("qend", ColumnKind::Int),
    column("sstart", ColumnKind::Int),
    column("send", ColumnKind::Int),
    column("qframe", ColumnKind::Int),
    column("sframe", ColumnKind::Frame),
    column("evalue", ColumnKind::Float),
    column("bitscore", ColumnKind::Float),
    column("qseq", ColumnKind::Text),
    column("sseq", ColumnKind::Text),
];

/// The `-outfmt` argument value.
pub fn output_format() -> String {
    let names: Vec<&str> = BLAST_COLUMNS.iter().map(|c| c.name).collect();
    format!("6 {}", names.join(" "))
}

fn column_index(name: &str) -> usize {
    BLAST_COLUMNS
        .iter()
        .position(|c| c.name == name)
        .unwrap_or_else(|| panic!("unknown blast column {name}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: QueryId,
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new(id: QueryId, sequence: impl Into<String>) -> Self {
        Self { id, sequence: sequence.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlastnMatch {
    pub query_seq_len: i32,
    pub subject_title: String,
    pub percentage_ident: f64,
    pub query_coverage: f64,
    pub alignment_length: i32,
    pub num_mismatch: i32,
    pub num_gap_openings: i32,
    pub query_align_start: i32,
    pub query_align_end: i32,
    pub subject_align_start: i32,
    pub subject_align_end: i32,
    pub query_frame: i32,
    pub subject_frame: Strand,
    pub expected_value: f64,
    pub bit_score: f64,
    pub aligned_part_of_query_seq: String,
    pub aligned_part_of_subject_seq: String,
}

/// Query id to hits, hits in the order blastn reported them.
pub type BlastnMatches = HashMap<QueryId, Vec<BlastnMatch>>;

#[derive(Debug, Clone)]
pub struct BlastnConfig {
    /// BLAST+ install directory; the binary is `<blast_dir>/bin/blastn`.
    pub blast_dir: PathBuf,
    /// Database directory, exported to the subprocess as `BLASTDB`.
    pub blast_db: PathBuf,
    pub db_name: String,
    /// Where the query FASTA and result table are written.
    pub output_dir: PathBuf,
    pub num_threads: usize,
    pub expected_value_cutoff: f64,
}

impl BlastnConfig {
    pub fn new(blast_dir: &Path, blast_db: &Path, output_dir: &Path) -> Self {
        Self {
            blast_dir: blast_dir.to_path_buf(),
            blast_db: blast_db.to_path_buf(),
            db_name: DEFAULT_DB_NAME.to_string(),
            output_dir: output_dir.to_path_buf(),
            num_threads: 1,
            expected_value_cutoff: DEFAULT_EXPECTED_VALUE_CUTOFF,
        }
    }

    pub fn blastn_path(&self) -> PathBuf {
        self.blast_dir.join("bin").join("blastn")
    }

    pub fn fasta_path(&self, sample_id: &str) -> PathBuf {
        self.output_dir.join(format!("{sample_id}.blastn.fa"))
    }

    pub fn result_path(&self, sample_id: &str) -> PathBuf {
        self.output_dir.join(format!("{sample_id}.blastn.csv"))
    }
}

/// Arguments passed to `blastn` (program path excluded).
pub fn blastn_args(config: &BlastnConfig, query_fasta: &Path) -> Vec<String> {
    vec![
        "-db".to_string(),
        config.db_name.clone(),
        "-task".to_string(),
        "blastn".to_string(),
        "-evalue".to_string(),
        config.expected_value_cutoff.to_string(),
        "-word_size".to_string(),
        WORD_SIZE.to_string(),
        "-reward".to_string(),
        MATCH_SCORE.to_string(),
        "-penalty".to_string(),
        MISMATCH_SCORE.to_string(),
        "-gapopen".to_string(),
        (-GAP_OPENING_SCORE).to_string(),
        "-gapextend".to_string(),
        (-GAP_EXTEND_SCORE).to_string(),
        "-mt_mode".to_string(),
        "0".to_string(),
        "-num_threads".to_string(),
        config.num_threads.to_string(),
        "-query".to_string(),
        query_fasta.display().to_string(),
        "-outfmt".to_string(),
        output_format(),
    ]
}

/// Runs blastn for one sample.
///
/// Not safe to call concurrently with the same `sample_id` and output
/// directory: the query and result file names would collide.
pub struct BlastnRunner {
    config: BlastnConfig,
    span: Span,
}

impl BlastnRunner {
    pub fn new(config: BlastnConfig) -> Self {
        Self { config, span: tracing::info_span!("blastn") }
    }

    /// Emit events inside `span` instead of the default `blastn` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns an empty map without touching the filesystem when `sequences` is empty.
    pub fn run(&self, sample_id: &str, sequences: &[SequenceRecord]) -> Result<BlastnMatches, BlastnError> {
        let _entered = self.span.enter();
        if sequences.is_empty() {
            return Ok(BlastnMatches::new());
        }

        let start = Instant::now();
        let fasta_path = self.config.fasta_path(sample_id);
        write_blast_fasta(sequences, &fasta_path)?;

        let result_path = self.config.result_path(sample_id);
        let result_file = File::create(&result_path).map_err(|source| BlastnError::Io {
            path: result_path.clone(),
            source,
        })?;

        tracing::info!("running blastn on sample {}, {} sequences", sample_id, sequences.len());

        let program = self.config.blastn_path();
        let args = blastn_args(&self.config, &fasta_path);
        tracing::info!("{} {}", program.display(), args.join(" "));

        let status = Command::new(&program)
            .args(&args)
            .env(BLASTDB_ENV, &self.config.blast_db)
            .stdin(Stdio::null())
            .stdout(Stdio::from(result_file))
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| {
                tracing::error!("failed to launch {}: {}", program.display(), source);
                BlastnError::Launch { program: program.clone(), source }
            })?;

        if !status.success() {
            tracing::error!("error executing blastn: {}", status);
            return Err(BlastnError::ToolFailed { status });
        }

        let seconds = start.elapsed().as_secs();
        tracing::info!("blastn run complete. Time taken: {}m {}s", seconds / 60, seconds % 60);

        let matches = parse_blastn_output(&result_path)?;

        // Only removed once parsed; a malformed table stays behind for inspection.
        std::fs::remove_file(&result_path).map_err(|source| BlastnError::Io {
            path: result_path.clone(),
            source,
        })?;

        Ok(matches)
    }
}

/// Convenience wrapper around [`BlastnRunner::run`].
pub fn run_blastn(
    config: &BlastnConfig,
    sample_id: &str,
    sequences: &[SequenceRecord],
) -> Result<BlastnMatches, BlastnError> {
    BlastnRunner::new(config.clone()).run(sample_id, sequences)
}

/// Writes `>id` / sequence line pairs in slice order.
pub fn write_blast_fasta(sequences: &[SequenceRecord], path: &Path) -> Result<(), BlastnError> {
    let io_err = |source: io::Error| BlastnError::Io { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for record in sequences {
        writeln!(writer, ">{}", record.id).map_err(io_err)?;
        writeln!(writer, "{}", record.sequence).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Parses a `-outfmt 6` table written with [`BLAST_COLUMNS`].
///
/// Any malformed row fails the whole table.
pub fn parse_blastn_output(path: &Path) -> Result<BlastnMatches, BlastnError> {
    let io_err = |source: io::Error| BlastnError::Io { path: path.to_path_buf(), source };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut matches = BlastnMatches::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.is_empty() {
            continue;
        }
        let row = Row::parse(path, i + 1, &line)?;
        matches
            .entry(row.int("qseqid")?)
            .or_default()
            .push(row.to_match()?);
    }
    Ok(matches)
}

/// One tab-separated line checked against [`BLAST_COLUMNS`].
struct Row<'a> {
    path: &'a Path,
    line: usize,
    fields: Vec<&'a str>,
}

impl<'a> Row<'a> {
    fn parse(path: &'a Path, line: usize, text: &'a str) -> Result<Self, BlastnError> {
        let fields: Vec<&str> = text.split('\t').collect();
        if fields.len() != BLAST_COLUMNS.len() {
            return Err(BlastnError::ColumnCount {
                path: path.to_path_buf(),
                line,
                expected: BLAST_COLUMNS.len(),
                found: fields.len(),
            });
        }
        let row = Self { path, line, fields };
        for (idx, col) in BLAST_COLUMNS.iter().enumerate() {
            let value = row.fields[idx];
            let valid = match col.kind {
                ColumnKind::Int => value.parse::<i32>().is_ok(),
                ColumnKind::Float => value.parse::<f64>().is_ok(),
                ColumnKind::Text => true,
                ColumnKind::Frame => value.parse::<i32>().ok().and_then(Strand::from_frame).is_some(),
            };
            if !valid {
                return Err(row.invalid(col.name));
            }
        }
        Ok(row)
    }

    fn invalid(&self, column: &'static str) -> BlastnError {
        BlastnError::Parse {
            path: self.path.to_path_buf(),
            line: self.line,
            column,
            value: self.fields[column_index(column)].to_string(),
        }
    }

    fn text(&self, name: &'static str) -> String {
        self.fields[column_index(name)].to_string()
    }

    fn int(&self, name: &'static str) -> Result<i32, BlastnError> {
        self.fields[column_index(name)].parse().map_err(|_| self.invalid(name))
    }

    fn float(&self, name: &'static str) -> Result<f64, BlastnError> {
        self.fields[column_index(name)].parse().map_err(|_| self.invalid(name))
    }

    fn frame(&self, name: &'static str) -> Result<Strand, BlastnError> {
        self.int(name)
            .ok()
            .and_then(Strand::from_frame)
            .ok_or_else(|| self.invalid(name))
    }

    fn to_match(&self) -> Result<BlastnMatch, BlastnError> {
        Ok(BlastnMatch {
            query_seq_len: self.int("qlen")?,
            subject_title: self.text("stitle"),
            percentage_ident: self.float("pident")?,
            query_coverage: self.float("qcovs")?,
            alignment_length: self.int("length")?,
            num_mismatch: self.int("mismatch")?,
            num_gap_openings: self.int("gapopen")?,
            query_align_start: self.int("qstart")?,
            query_align_end: self.int("qend")?,
            subject_align_start: self.int("sstart")?,
            subject_align_end: self.int("send")?,
            query_frame: self.int("qframe")?,
            subject_frame: self.frame("sframe")?,
            expected_value: self.float("evalue")?,
            bit_score: self.float("bitscore")?,
            aligned_part_of_query_seq: self.text("qseq"),
            aligned_part_of_subject_seq: self.text("sseq"),
        })
    }
}
