/// Query identifier written to the blastn FASTA header and echoed back in `qseqid`.
pub type QueryId = i32;
/// 1-based genomic position.
pub type Pos = u32;
/// 0-based offset into transcript coordinate space.
pub type Locus = u32;

// Fast hash maps using AHash instead of the default SipHash.
// Import throughout the codebase with `use crate::types::HashMap`, plus
// `HashMapExt` when you need `::new()` or `::with_capacity()`.
pub type HashMap<K, V> = ahash::HashMap<K, V>;
pub use ahash::HashMapExt;
