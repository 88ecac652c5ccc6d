use crate::error::Error;
use crate::{Result, EFFECTIVE_GENOME_FRACTION};
use log::{debug, info};
use std::{
    collections::HashMap,
    fmt,
    io::{self, BufRead},
    path::Path,
};

/// Reference genome held in memory, keyed by chromosome identifier
#[derive(Debug, Default, Clone)]
pub struct ReferenceSequence {
    seqs: HashMap<String, Vec<u8>>,
    order: Vec<String>,
}

impl ReferenceSequence {
    /// Reads a possibly compressed FASTA file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Reading reference {}...", path.as_ref().display());
        let (rdr, _) = niffler::from_path(path)?;
        Self::from_reader(rdr)
    }

    /// Reads FASTA records from any reader. Later records with a duplicated id replace earlier ones.
    pub fn from_reader<R: io::Read>(rdr: R) -> Result<Self> {
        let fasta_rdr = bio::io::fasta::Reader::new(rdr);
        let mut reference = Self::default();
        for record in fasta_rdr.records() {
            let record = record?;
            debug!(
                "Loaded chromosome {} of length {}",
                record.id(),
                record.seq().len()
            );
            reference.insert(record.id().to_string(), record.seq().to_vec());
        }
        Ok(reference)
    }

    /// Adds or replaces a chromosome
    pub fn insert<S: Into<String>>(&mut self, chrom: S, seq: Vec<u8>) {
        let chrom = chrom.into();
        if self.seqs.insert(chrom.clone(), seq).is_none() {
            self.order.push(chrom);
        }
    }

    /// Sequence of a chromosome
    pub fn get(&self, chrom: &str) -> Result<&[u8]> {
        self.seqs
            .get(chrom)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownChromosome(chrom.to_string()))
    }

    /// Length of a chromosome
    pub fn chrom_len(&self, chrom: &str) -> Result<u64> {
        self.get(chrom).map(|seq| seq.len() as u64)
    }

    /// Half-open slice `[start, end)` of a chromosome. Coordinates past the chromosome end are
    /// truncated to its length.
    pub fn fetch(&self, chrom: &str, start: u64, end: u64) -> Result<&[u8]> {
        let seq = self.get(chrom)?;
        let end = (end as usize).min(seq.len());
        let start = (start as usize).min(end);
        Ok(&seq[start..end])
    }

    /// Chromosome identifiers in FASTA order
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Sum of all chromosome lengths
    pub fn total_len(&self) -> u64 {
        self.seqs.values().map(|seq| seq.len() as u64).sum()
    }

    /// Effective genome size expected by `MACS2`, see [`effective_genome_size`]
    pub fn effective_genome_size(&self) -> u64 {
        effective_genome_size(self.total_len())
    }
}

/// Per `MACS2` documentation the effective genome size is 0.7-0.9 of the genome size.
/// 0.9 is used throughout.
pub fn effective_genome_size(total_len: u64) -> u64 {
    (total_len as f64 * EFFECTIVE_GENOME_FRACTION).round() as u64
}

/// Half-open interval as reported in the first three columns of a BED/narrowPeak file
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct PeakInterval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl PeakInterval {
    /// Creates an interval, returns `None` when `start >= end`
    pub fn new<S: Into<String>>(chrom: S, start: u64, end: u64) -> Option<Self> {
        if start < end {
            Some(Self {
                chrom: chrom.into(),
                start,
                end,
            })
        } else {
            None
        }
    }

    /// Number of bases covered
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Always false as empty intervals cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for PeakInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Reads a possibly compressed BED/narrowPeak file
pub fn peaks_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<PeakInterval>> {
    info!("Reading peaks from {}...", path.as_ref().display());
    let (rdr, _) = niffler::from_path(path)?;
    read_peaks(rdr)
}

/// Collects the peak intervals of a BED-like stream, only the first three columns are used.
/// Blank and `#` lines are ignored, errors carry the line number in the input.
pub fn read_peaks<R: io::Read>(rdr: R) -> Result<Vec<PeakInterval>> {
    let mut records = Vec::new();
    let mut line_numbers = Vec::new();
    for (i, line) in io::BufReader::new(rdr).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        records.extend_from_slice(line.as_bytes());
        records.push(b'\n');
        line_numbers.push(i + 1);
    }

    let mut bed_rdr = bio::io::bed::Reader::new(&records[..]);
    let mut peaks = Vec::new();
    for (record, line) in bed_rdr.records().zip(line_numbers) {
        let record = record.map_err(|_| Error::BedRecordError(line))?;
        let peak = PeakInterval::new(record.chrom(), record.start(), record.end())
            .ok_or_else(|| Error::IncorrectInterval(line, record.start(), record.end()))?;
        peaks.push(peak);
    }
    debug!("Read {} peaks", peaks.len());
    Ok(peaks)
}

/// Reverse complement of a nucleotide sequence, IUPAC codes and case are preserved
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    bio::alphabets::dna::revcomp(seq)
}

/// Checks if `pattern` occurs literally in `seq`, soft-masked bases do not match upper case
pub fn contains_subsequence(seq: &[u8], pattern: &[u8]) -> bool {
    if pattern.is_empty() {
        return true;
    }
    seq.windows(pattern.len()).any(|window| window == pattern)
}
