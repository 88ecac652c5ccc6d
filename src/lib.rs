#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Recenters ChIP-seq peaks on the best hit of a transcription factor motif.
//! Peaks called by `MACS2` are scanned with a log-odds matrix built from a
//! position frequency matrix, re-centered on the top scoring window and
//! annotated with the mean treatment coverage under the motif match, the strand
//! of the match and whether the motif consensus occurs in the new interval.
//!

pub mod alignment;
pub mod error;
pub mod genomic;
pub mod motif;
pub mod peak_caller;
pub mod recenter;

/// Nucleotide alphabet used, in matrix column order
pub const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];
/// Pseudocount added to every PFM cell before the log-odds transform
pub const PSEUDOCOUNT: f64 = 0.5;
/// Fraction of the reference length reported as the effective genome size
pub const EFFECTIVE_GENOME_FRACTION: f64 = 0.9;
/// Default extension on either side of the best motif hit
pub const DEFAULT_SLOP: u64 = 100;
/// Suffix of the peak file written by `macs2 callpeak`
pub const NARROW_PEAK_SUFFIX: &str = "_peaks.narrowPeak";
/// Suffix of the re-centered interval output
pub const CENTERED_BED_SUFFIX: &str = "_centeredpeaks.bed";
/// Suffix of the re-centered sequence output
pub const CENTERED_FASTA_SUFFIX: &str = "_centeredpeaks.fasta";

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, crate::error::Error>;
