use crate::Result;
use log::{debug, info, warn};
use rayon::prelude::*;
use rust_htslib::bam::{self, Read};
use std::{collections::HashMap, convert::TryFrom, iter, path::Path};

/// Number of records between progress messages
const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Per chromosome read depth. Positions that were never covered have a depth of zero.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoverageMap {
    depth: HashMap<String, Vec<u32>>,
}

impl CoverageMap {
    /// Empty coverage
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the depth of every position in `[start, start + len)`
    pub fn add(&mut self, chrom: &str, start: u64, len: u64) {
        if len == 0 {
            return;
        }
        if !self.depth.contains_key(chrom) {
            self.depth.insert(chrom.to_string(), Vec::new());
        }
        if let Some(counts) = self.depth.get_mut(chrom) {
            let (start, end) = (start as usize, (start + len) as usize);
            if counts.len() < end {
                counts.resize(end, 0);
            }
            counts[start..end]
                .iter_mut()
                .for_each(|count| *count = count.saturating_add(1));
        }
    }

    /// Depth at a single position
    pub fn depth(&self, chrom: &str, pos: u64) -> u32 {
        self.depth
            .get(chrom)
            .and_then(|counts| counts.get(pos as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of depths over `[start, end)`
    pub fn total_depth(&self, chrom: &str, start: u64, end: u64) -> u64 {
        match self.depth.get(chrom) {
            Some(counts) => {
                let end = (end as usize).min(counts.len());
                let start = (start as usize).min(end);
                counts[start..end].iter().map(|count| *count as u64).sum()
            }
            None => 0,
        }
    }

    /// Mean depth over `[start, end)`, zero for an empty interval
    pub fn mean_depth(&self, chrom: &str, start: u64, end: u64) -> f64 {
        if end <= start {
            return 0.0;
        }
        self.total_depth(chrom, start, end) as f64 / (end - start) as f64
    }

    /// Adds the counts of `other`
    pub fn merge(&mut self, other: CoverageMap) {
        for (chrom, other_counts) in other.depth {
            match self.depth.get_mut(&chrom) {
                Some(counts) => {
                    if counts.len() < other_counts.len() {
                        counts.resize(other_counts.len(), 0);
                    }
                    counts
                        .iter_mut()
                        .zip(other_counts)
                        .for_each(|(count, other)| *count = count.saturating_add(other));
                }
                None => {
                    self.depth.insert(chrom, other_counts);
                }
            }
        }
    }

}

/// Minimal view of an aligned read needed for coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AlignedRead<'a> {
    pub chrom: Option<&'a str>,
    pub pos: i64,
    pub len: usize,
    pub unmapped: bool,
}

/// Reason a read does not contribute to coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Read is flagged as unmapped
    Unmapped,
    /// Read has no reference sequence or a negative position
    MissingChromosome,
    /// Read has no stored sequence
    EmptySequence,
}

/// Read counts of a coverage aggregation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AggregationSummary {
    pub counted: u64,
    pub unmapped: u64,
    pub missing_chromosome: u64,
    pub empty_sequence: u64,
}

impl AggregationSummary {
    /// Total number of skipped reads
    pub fn skipped(&self) -> u64 {
        self.unmapped + self.missing_chromosome + self.empty_sequence
    }

    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Unmapped => self.unmapped += 1,
            SkipReason::MissingChromosome => self.missing_chromosome += 1,
            SkipReason::EmptySequence => self.empty_sequence += 1,
        }
    }

    fn merge(&mut self, other: &AggregationSummary) {
        self.counted += other.counted;
        self.unmapped += other.unmapped;
        self.missing_chromosome += other.missing_chromosome;
        self.empty_sequence += other.empty_sequence;
    }
}

/// Streaming reduction of aligned reads into a [`CoverageMap`]
#[derive(Debug, Default)]
pub struct CoverageAggregator {
    coverage: CoverageMap,
    summary: AggregationSummary,
}

impl CoverageAggregator {
    /// Empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a read, reads that cannot be placed are skipped and counted
    pub fn observe(&mut self, read: &AlignedRead<'_>) -> std::result::Result<(), SkipReason> {
        let outcome = classify(read);
        match outcome {
            Ok(chrom) => {
                self.coverage.add(chrom, read.pos as u64, read.len as u64);
                self.summary.counted += 1;
            }
            Err(reason) => self.summary.record_skip(reason),
        }
        outcome.map(|_| ())
    }

    /// Counts so far
    pub fn summary(&self) -> &AggregationSummary {
        &self.summary
    }

    /// Finished coverage and counts
    pub fn finish(self) -> (CoverageMap, AggregationSummary) {
        (self.coverage, self.summary)
    }

    /// Streams every record of a BAM/SAM file
    pub fn add_bam(&mut self, bam: &mut bam::Reader) -> Result<()> {
        let header = bam.header().clone();
        let names = target_names(&header)?;
        let mut record = bam::Record::new();
        let mut seen = 0u64;

        while let Some(result) = bam.read(&mut record) {
            result?;
            seen += 1;
            self.observe_record(&record, &names);
            if seen % PROGRESS_INTERVAL == 0 {
                debug!("Processed {} alignment records", seen);
            }
        }
        Ok(())
    }

    fn observe_record(&mut self, record: &bam::Record, names: &[String]) {
        let chrom = usize::try_from(record.tid())
            .ok()
            .and_then(|tid| names.get(tid))
            .map(String::as_str);
        let read = AlignedRead {
            chrom,
            pos: record.pos(),
            len: record.seq_len(),
            unmapped: record.is_unmapped(),
        };
        if let Err(reason) = self.observe(&read) {
            debug!(
                "Skipping read {} ({:?})",
                String::from_utf8_lossy(record.qname()),
                reason
            );
        }
    }
}

fn classify<'a>(read: &AlignedRead<'a>) -> std::result::Result<&'a str, SkipReason> {
    if read.unmapped {
        return Err(SkipReason::Unmapped);
    }
    let chrom = match read.chrom {
        Some(chrom) if read.pos >= 0 => chrom,
        _ => return Err(SkipReason::MissingChromosome),
    };
    if read.len == 0 {
        return Err(SkipReason::EmptySequence);
    }
    Ok(chrom)
}

fn target_names(header: &bam::HeaderView) -> Result<Vec<String>> {
    header
        .target_names()
        .into_iter()
        .map(|name| Ok(String::from_utf8(name.to_vec())?))
        .collect()
}

/// Aggregates the coverage of all `paths` into a single map. With more than one thread and an
/// index next to an alignment file, that file is aggregated per chromosome in parallel.
pub fn coverage_from_paths<P: AsRef<Path>>(
    paths: &[P],
    threads: usize,
) -> Result<(CoverageMap, AggregationSummary)> {
    let mut coverage = CoverageMap::new();
    let mut summary = AggregationSummary::default();

    for path in paths {
        let path = path.as_ref();
        info!("Calculating coverage for {}...", path.display());
        let indexed = threads > 1 && bam::IndexedReader::from_path(path).is_ok();
        let (file_coverage, file_summary) = if indexed {
            coverage_by_chromosome(path)?
        } else {
            let mut bam = bam::Reader::from_path(path)?;
            if threads > 1 {
                bam.set_threads(threads)?;
            }
            let mut aggregator = CoverageAggregator::new();
            aggregator.add_bam(&mut bam)?;
            aggregator.finish()
        };

        if file_summary.skipped() > 0 {
            warn!(
                "Skipped {} reads in {} ({} unmapped, {} without chromosome, {} without sequence)",
                file_summary.skipped(),
                path.display(),
                file_summary.unmapped,
                file_summary.missing_chromosome,
                file_summary.empty_sequence
            );
        }
        info!("Counted {} reads in {}", file_summary.counted, path.display());
        coverage.merge(file_coverage);
        summary.merge(&file_summary);
    }

    Ok((coverage, summary))
}

/// Aggregates each reference sequence of an indexed alignment file in its own task. Reads
/// without a reference sequence are visited by a final task so skip counts match a single pass.
pub fn coverage_by_chromosome<P: AsRef<Path>>(path: P) -> Result<(CoverageMap, AggregationSummary)> {
    let path = path.as_ref();
    let names = {
        let bam = bam::IndexedReader::from_path(path)?;
        target_names(bam.header())?
    };
    debug!(
        "Aggregating {} reference sequences of {} in parallel",
        names.len(),
        path.display()
    );

    let shards: Vec<Option<&String>> = names.iter().map(Some).chain(iter::once(None)).collect();
    shards
        .par_iter()
        .map(|shard| -> Result<(CoverageMap, AggregationSummary)> {
            let mut bam = bam::IndexedReader::from_path(path)?;
            match shard {
                Some(chrom) => bam.fetch(chrom.as_str())?,
                None => bam.fetch(bam::FetchDefinition::Unmapped)?,
            }
            let mut aggregator = CoverageAggregator::new();
            let mut record = bam::Record::new();
            while let Some(result) = bam.read(&mut record) {
                result?;
                aggregator.observe_record(&record, &names);
            }
            Ok(aggregator.finish())
        })
        .try_reduce(
            || (CoverageMap::new(), AggregationSummary::default()),
            |(mut coverage, mut summary), (other_coverage, other_summary)| {
                coverage.merge(other_coverage);
                summary.merge(&other_summary);
                Ok((coverage, summary))
            },
        )
}
