//! fragslice-rs: slice sequencing reads onto coding-transcript coordinates and
//! run batched `blastn` searches.
//!
//! # Library usage
//!
//! ```no_run
//! use fragslice_rs::annotation::load_transcripts;
//! use fragslice_rs::fragment::NucleotideFragmentFactory;
//! use fragslice_rs::slicer::{RegionAlignmentProjector, SliceConfig};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let transcripts = load_transcripts(Path::new("genes.gtf"))?;
//! let projector = RegionAlignmentProjector::new(
//!     SliceConfig::default(),
//!     transcripts,
//!     NucleotideFragmentFactory,
//! )?;
//! let fragments = projector.read_from_bam(Path::new("sample.bam"))?;
//! # let _ = fragments;
//! # Ok(())
//! # }
//! ```

pub mod alignment;
pub mod annotation;
pub mod bam_input;
pub mod blastn;
pub mod fasta;
pub mod fragment;
pub mod projection;
pub mod region;
pub mod slicer;
pub mod types;

// Flat re-exports for the most commonly used public types.
pub use blastn::{BlastnConfig, BlastnError, BlastnMatch, BlastnRunner, SequenceRecord};
pub use fragment::{Fragment, FragmentFactory, NucleotideFragmentFactory};
pub use slicer::{RegionAlignmentProjector, SliceConfig};
