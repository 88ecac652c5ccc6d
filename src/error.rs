use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors of which majority are related to I/O issues or incorrect file format errors
pub enum Error {
    #[error("Could not read input file")]
    /// Could not read an entry in a FASTA, BED or matrix file
    Io(#[from] std::io::Error),
    #[error("Could not convert bytes as they are invalid UTF-8")]
    /// Data is not in UTF-8 format
    NotUTF8(#[from] std::string::FromUtf8Error),
    #[error("Could not read/process the alignment file")]
    /// BAM/SAM reading error
    BamError(#[from] rust_htslib::errors::Error),
    #[error("Could not open possibly compressed input file")]
    /// Opening a FASTA/BED/matrix file through niffler failed
    CompressedInputError(#[from] niffler::Error),
    #[error("Could not spawn threads")]
    /// Create thread pools erorr
    ThreadError,
    #[error("Could not read BED entry at line {0}")]
    /// Malformed BED/narrowPeak line
    BedRecordError(usize),
    #[error("Incorrect interval in BED entry on line {0}, end {2} is not larger than start {1}")]
    /// Peak with an empty or inverted interval
    IncorrectInterval(usize, u64, u64),
    #[error("Chromosome `{0}` is not present in the reference")]
    /// Peak placed on a chromosome missing from the FASTA
    UnknownChromosome(String),
    #[error("Invalid frequency matrix: {0}")]
    /// PFM could not be turned into a scoring matrix
    InvalidMatrix(String),
    #[error("Could not start peak caller `{program}`")]
    /// Peak caller executable could not be spawned
    PeakCallerSpawn {
        /// Program that was invoked
        program: PathBuf,
        /// Underlying spawn error
        source: std::io::Error,
    },
    #[error("Peak caller `{program}` exited with status {code:?}")]
    /// Peak caller returned a non-zero exit status
    PeakCallerFailed {
        /// Program that was invoked
        program: PathBuf,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },
    #[error("Expected peak file {0} was not produced by the peak caller")]
    /// Peak caller finished but the narrowPeak file is missing
    MissingPeaksFile(PathBuf),
}
