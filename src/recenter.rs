use crate::alignment::CoverageMap;
use crate::genomic::{contains_subsequence, reverse_complement, PeakInterval, ReferenceSequence};
use crate::motif::{MotifHit, Scan, ScoringMatrix, Strand};
use crate::{Result, DEFAULT_SLOP};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::io::Write;

/// Track color of peaks containing the motif consensus
pub const CONSENSUS_COLOR: &str = "255,0,0";
/// Track color of peaks without the motif consensus
pub const NO_CONSENSUS_COLOR: &str = "0,0,255";
/// Number of peaks processed in parallel before their records are written
pub const WRITE_CHUNK: usize = 1024;

/// What to do with a re-centered interval that extends past a chromosome end
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BoundaryPolicy {
    /// Drop the peak
    Skip,
    /// Clamp the interval to the chromosome
    Clamp,
}

/// Settings of the peak recenterer
#[derive(Debug, Clone, PartialEq)]
pub struct RecenterOptions {
    /// Extension on either side of the motif hit
    pub slop: u64,
    /// Handling of intervals past chromosome ends
    pub boundary: BoundaryPolicy,
    /// Minimum log-odds score of a motif hit
    pub min_score: Option<f64>,
}

impl Default for RecenterOptions {
    fn default() -> Self {
        Self {
            slop: DEFAULT_SLOP,
            boundary: BoundaryPolicy::Skip,
            min_score: None,
        }
    }
}

/// Peak re-centered on its best motif hit
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct CenteredPeak {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub hit_start: u64,
    pub hit_end: u64,
    pub score: f64,
    pub strand: Strand,
    pub sequence: Vec<u8>,
    pub mean_coverage: f64,
    pub has_consensus: bool,
    pub clamped: bool,
    pub source: PeakInterval,
}

impl CenteredPeak {
    /// `itemRgb` of the peak
    pub fn color(&self) -> &'static str {
        if self.has_consensus {
            CONSENSUS_COLOR
        } else {
            NO_CONSENSUS_COLOR
        }
    }

    /// Identifier used in the FASTA output, `chrom|start`
    pub fn fasta_id(&self) -> String {
        format!("{}|{}", self.chrom, self.start)
    }

    /// Converts the peak into a bed entry with the sequence in the name column and the mean
    /// coverage in the score column
    pub fn to_bed_row(&self) -> Result<String> {
        Ok(format!(
            "{}\t{}\t{}\t{}\t{:.2}\t{}\t0\t0\t{}",
            self.chrom,
            self.start,
            self.end,
            String::from_utf8(self.sequence.clone())?,
            self.mean_coverage,
            self.strand,
            self.color()
        ))
    }
}

/// Outcome of re-centering a single peak
#[derive(Debug, Clone, PartialEq)]
pub enum Recentered {
    /// Peak was re-centered
    Centered(CenteredPeak),
    /// No window of the peak could be scored
    NoHits,
    /// Re-centered interval extends past the chromosome and the policy is [`BoundaryPolicy::Skip`]
    OutOfBounds,
}

/// Peak counts of a recentering run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RecenterSummary {
    pub peaks: usize,
    pub emitted: usize,
    pub no_hits: usize,
    pub out_of_bounds: usize,
    pub clamped: usize,
    pub unscorable_windows: usize,
}

impl RecenterSummary {
    /// Logs the totals, dropped peaks are reported as warnings
    pub fn report(&self) {
        info!("Re-centered {} of {} peaks", self.emitted, self.peaks);
        if self.no_hits > 0 {
            warn!("Dropped {} peaks without any motif hit", self.no_hits);
        }
        if self.out_of_bounds > 0 {
            warn!(
                "Dropped {} peaks extending past a chromosome end, use clamping to keep them",
                self.out_of_bounds
            );
        }
        if self.clamped > 0 {
            info!("Clamped {} peaks to chromosome bounds", self.clamped);
        }
        if self.unscorable_windows > 0 {
            warn!(
                "Skipped {} windows containing nucleotides other than A, C, G and T",
                self.unscorable_windows
            );
        }
    }
}

/// Scans peaks for the motif and re-centers them on the best hit. All inputs are read only so
/// peaks are processed in parallel.
#[derive(Debug)]
pub struct Recenterer<'a> {
    reference: &'a ReferenceSequence,
    matrix: &'a ScoringMatrix,
    coverage: &'a CoverageMap,
    options: RecenterOptions,
}

impl<'a> Recenterer<'a> {
    #[allow(missing_docs)]
    pub fn new(
        reference: &'a ReferenceSequence,
        matrix: &'a ScoringMatrix,
        coverage: &'a CoverageMap,
        options: RecenterOptions,
    ) -> Self {
        Self {
            reference,
            matrix,
            coverage,
            options,
        }
    }

    /// Scores every window of the peak sequence on both strands
    pub fn scan(&self, peak: &PeakInterval) -> Result<Scan> {
        let seq = self.reference.fetch(&peak.chrom, peak.start, peak.end)?;
        Ok(self.matrix.scan(seq, self.options.min_score))
    }

    /// Re-centers `peak` on the first of `hits`, which are expected in descending score order
    pub fn recenter(&self, peak: &PeakInterval, hits: &[MotifHit]) -> Result<Recentered> {
        let hit = match hits.first() {
            Some(hit) => hit,
            None => return Ok(Recentered::NoHits),
        };

        let hit_start = peak.start + hit.offset;
        let hit_end = hit_start + self.matrix.width() as u64;
        let chrom_len = self.reference.chrom_len(&peak.chrom)?;
        let slop = self.options.slop;

        let bounds = (hit_start.checked_sub(slop), hit_end.checked_add(slop));
        let (start, end, clamped) = match bounds {
            (Some(start), Some(end)) if end <= chrom_len => (start, end, false),
            (start, _) => match self.options.boundary {
                BoundaryPolicy::Skip => return Ok(Recentered::OutOfBounds),
                BoundaryPolicy::Clamp => (
                    start.unwrap_or(0),
                    hit_end.saturating_add(slop).min(chrom_len),
                    true,
                ),
            },
        };

        let forward = self.reference.fetch(&peak.chrom, start, end)?;
        let sequence = match hit.strand {
            Strand::Forward => forward.to_vec(),
            Strand::Reverse => reverse_complement(forward),
        };
        let consensus = self.matrix.consensus();
        let has_consensus = contains_subsequence(&sequence, consensus)
            || contains_subsequence(&reverse_complement(&sequence), consensus);

        Ok(Recentered::Centered(CenteredPeak {
            chrom: peak.chrom.clone(),
            start,
            end,
            hit_start,
            hit_end,
            score: hit.score,
            strand: hit.strand,
            sequence,
            mean_coverage: self.coverage.mean_depth(&peak.chrom, hit_start, hit_end),
            has_consensus,
            clamped,
            source: peak.clone(),
        }))
    }

    /// Scans and re-centers a single peak, also returning the number of unscorable windows
    pub fn process(&self, peak: &PeakInterval) -> Result<(Recentered, usize)> {
        let scan = self.scan(peak)?;
        let recentered = self.recenter(peak, &scan.hits)?;
        Ok((recentered, scan.unscorable))
    }

    /// Re-centers all peaks writing bed rows to `bed` and sequences to `fasta` in input order.
    /// Peaks are processed in chunks of [`WRITE_CHUNK`], each written before the next starts.
    pub fn run<B: Write, F: Write>(
        &self,
        peaks: &[PeakInterval],
        mut bed: B,
        fasta: F,
    ) -> Result<RecenterSummary> {
        let mut fasta_wtr = bio::io::fasta::Writer::new(fasta);
        let mut summary = RecenterSummary {
            peaks: peaks.len(),
            ..RecenterSummary::default()
        };

        for chunk in peaks.chunks(WRITE_CHUNK) {
            let outcomes = chunk
                .par_iter()
                .map(|peak| self.process(peak))
                .collect::<Result<Vec<_>>>()?;

            for (peak, (outcome, unscorable)) in chunk.iter().zip(outcomes) {
                summary.unscorable_windows += unscorable;
                match outcome {
                    Recentered::Centered(centered) => {
                        debug!(
                            "Peak {} re-centered on {}:{}-{} ({}) with score {:.3}",
                            centered.source,
                            centered.chrom,
                            centered.hit_start,
                            centered.hit_end,
                            centered.strand,
                            centered.score
                        );
                        writeln!(bed, "{}", centered.to_bed_row()?)?;
                        fasta_wtr.write(&centered.fasta_id(), None, &centered.sequence)?;
                        summary.emitted += 1;
                        if centered.clamped {
                            debug!("Peak {} was clamped to its chromosome", centered.source);
                            summary.clamped += 1;
                        }
                    }
                    Recentered::NoHits => {
                        debug!("No motif hits in peak {}", peak);
                        summary.no_hits += 1;
                    }
                    Recentered::OutOfBounds => {
                        debug!("Re-centered peak {} extends past its chromosome", peak);
                        summary.out_of_bounds += 1;
                    }
                }
            }
        }

        bed.flush()?;
        fasta_wtr.flush()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static GATA1: &str = ">MA0035.4 GATA1
A  [    1     0    20     0    20     1 ]
C  [    8     0     0     0     0     2 ]
G  [    1    20     0     0     0     9 ]
T  [   10     0     0    20     0     8 ]
";

    fn reference_with(len: usize, planted: &[(usize, &str)]) -> ReferenceSequence {
        let mut seq = vec![b'C'; len];
        for (pos, motif) in planted {
            seq[*pos..*pos + motif.len()].copy_from_slice(motif.as_bytes());
        }
        let mut reference = ReferenceSequence::default();
        reference.insert("chr1", seq);
        reference
    }

    fn gata1() -> ScoringMatrix {
        ScoringMatrix::from_reader(GATA1.as_bytes()).unwrap()
    }

    fn gata() -> ScoringMatrix {
        ScoringMatrix::from_counts(&[
            [0.0, 0.0, 9.0, 1.0],
            [9.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 9.0],
            [9.0, 0.0, 0.0, 1.0],
        ])
        .unwrap()
    }

    fn hit(offset: u64, strand: Strand) -> MotifHit {
        MotifHit {
            offset,
            strand,
            score: 1.0,
        }
    }

    fn centered(recentered: Recentered) -> CenteredPeak {
        match recentered {
            Recentered::Centered(peak) => peak,
            other => panic!("expected a re-centered peak, got {:?}", other),
        }
    }

    #[test]
    fn forward_hit_is_recentered() {
        let reference = reference_with(2000, &[]);
        let matrix = gata1();
        let mut coverage = CoverageMap::new();
        for (pos, count) in [(1050, 2), (1051, 2), (1054, 4), (1055, 4)].iter() {
            for _ in 0..*count {
                coverage.add("chr1", *pos, 1);
            }
        }
        let recenterer =
            Recenterer::new(&reference, &matrix, &coverage, RecenterOptions::default());
        let peak = PeakInterval::new("chr1", 1000, 1200).unwrap();

        let peak = centered(
            recenterer
                .recenter(&peak, &[hit(50, Strand::Forward), hit(3, Strand::Reverse)])
                .unwrap(),
        );
        assert_eq!((peak.hit_start, peak.hit_end), (1050, 1056));
        assert_eq!((peak.start, peak.end), (950, 1156));
        assert_eq!(peak.end - peak.start, (peak.hit_end - peak.hit_start) + 2 * 100);
        assert_eq!(peak.strand, Strand::Forward);
        assert_eq!(peak.sequence, reference.fetch("chr1", 950, 1156).unwrap());
        assert!((peak.mean_coverage - 2.0).abs() < 1e-12);
        assert!(!peak.clamped);
    }

    #[test]
    fn reverse_hit_emits_reverse_complement() {
        let reference = reference_with(400, &[(150, "CTATCA"), (100, "AAAA")]);
        let matrix = gata1();
        let coverage = CoverageMap::new();
        let recenterer =
            Recenterer::new(&reference, &matrix, &coverage, RecenterOptions::default());
        let peak = PeakInterval::new("chr1", 120, 220).unwrap();

        let (recentered, unscorable) = recenterer.process(&peak).unwrap();
        assert_eq!(unscorable, 0);
        let peak = centered(recentered);
        assert_eq!(peak.strand, Strand::Reverse);
        assert_eq!((peak.hit_start, peak.hit_end), (150, 156));
        let forward = reference.fetch("chr1", 50, 256).unwrap();
        assert_eq!(peak.sequence, reverse_complement(forward));
        assert_eq!(reverse_complement(&peak.sequence), forward.to_vec());
        assert!(peak.has_consensus);
        assert_eq!(peak.to_bed_row().unwrap().split('\t').nth(5), Some("-"));
    }

    #[test]
    fn peak_without_hits_is_dropped() {
        let reference = reference_with(400, &[]);
        let matrix = gata1();
        let coverage = CoverageMap::new();
        let recenterer =
            Recenterer::new(&reference, &matrix, &coverage, RecenterOptions::default());
        let peak = PeakInterval::new("chr1", 100, 104).unwrap();

        assert_eq!(recenterer.recenter(&peak, &[]).unwrap(), Recentered::NoHits);
        assert_eq!(recenterer.process(&peak).unwrap().0, Recentered::NoHits);
    }

    #[test]
    fn out_of_bounds_is_skipped_or_clamped() {
        let reference = reference_with(300, &[]);
        let matrix = gata1();
        let coverage = CoverageMap::new();
        let peak = PeakInterval::new("chr1", 10, 60).unwrap();

        let skipping =
            Recenterer::new(&reference, &matrix, &coverage, RecenterOptions::default());
        assert_eq!(
            skipping.recenter(&peak, &[hit(0, Strand::Forward)]).unwrap(),
            Recentered::OutOfBounds
        );

        let options = RecenterOptions {
            boundary: BoundaryPolicy::Clamp,
            ..RecenterOptions::default()
        };
        let clamping = Recenterer::new(&reference, &matrix, &coverage, options);
        let near_start = centered(clamping.recenter(&peak, &[hit(0, Strand::Forward)]).unwrap());
        assert_eq!((near_start.start, near_start.end), (0, 116));
        assert!(near_start.clamped);

        let tail = PeakInterval::new("chr1", 250, 300).unwrap();
        let near_end = centered(clamping.recenter(&tail, &[hit(40, Strand::Forward)]).unwrap());
        assert_eq!((near_end.start, near_end.end), (190, 300));
        assert_eq!(near_end.sequence.len(), 110);
    }

    #[test]
    fn huge_slop_does_not_overflow() {
        let reference = reference_with(300, &[]);
        let matrix = gata1();
        let coverage = CoverageMap::new();
        let peak = PeakInterval::new("chr1", 100, 160).unwrap();
        let hits = [hit(20, Strand::Forward)];

        let skip = RecenterOptions {
            slop: u64::MAX,
            ..RecenterOptions::default()
        };
        let skipping = Recenterer::new(&reference, &matrix, &coverage, skip.clone());
        assert_eq!(
            skipping.recenter(&peak, &hits).unwrap(),
            Recentered::OutOfBounds
        );

        let clamp = RecenterOptions {
            boundary: BoundaryPolicy::Clamp,
            ..skip
        };
        let clamping = Recenterer::new(&reference, &matrix, &coverage, clamp);
        let peak = centered(clamping.recenter(&peak, &hits).unwrap());
        assert_eq!((peak.start, peak.end), (0, 300));
        assert_eq!((peak.hit_start, peak.hit_end), (120, 126));
    }

    #[test]
    fn consensus_sets_color() {
        let matrix = gata();
        assert_eq!(matrix.consensus(), b"GATA");
        let coverage = CoverageMap::new();
        let options = RecenterOptions {
            slop: 10,
            ..RecenterOptions::default()
        };
        let peak = PeakInterval::new("chr1", 40, 80).unwrap();

        let forward = reference_with(200, &[(55, "GATA")]);
        let recenterer = Recenterer::new(&forward, &matrix, &coverage, options.clone());
        let found = centered(recenterer.recenter(&peak, &[hit(15, Strand::Forward)]).unwrap());
        assert!(contains_subsequence(&found.sequence, b"GATA"));
        assert!(!contains_subsequence(&reverse_complement(&found.sequence), b"GATA"));
        assert_eq!(found.color(), CONSENSUS_COLOR);

        let soft_masked = reference_with(200, &[(55, "gata")]);
        let recenterer = Recenterer::new(&soft_masked, &matrix, &coverage, options.clone());
        let found = centered(recenterer.recenter(&peak, &[hit(15, Strand::Forward)]).unwrap());
        assert_eq!(found.color(), NO_CONSENSUS_COLOR);

        let reverse_only = reference_with(200, &[(55, "TATC")]);
        let recenterer = Recenterer::new(&reverse_only, &matrix, &coverage, options.clone());
        let found = centered(recenterer.recenter(&peak, &[hit(15, Strand::Forward)]).unwrap());
        assert_eq!(found.color(), CONSENSUS_COLOR);

        let missing = reference_with(200, &[(55, "GAGA")]);
        let recenterer = Recenterer::new(&missing, &matrix, &coverage, options);
        let found = centered(recenterer.recenter(&peak, &[hit(15, Strand::Forward)]).unwrap());
        assert_eq!(found.color(), NO_CONSENSUS_COLOR);
    }

    #[test]
    fn bed_row_layout() {
        let reference = reference_with(400, &[(200, "TGATAG")]);
        let matrix = gata1();
        let mut coverage = CoverageMap::new();
        coverage.add("chr1", 190, 20);
        let options = RecenterOptions {
            slop: 2,
            ..RecenterOptions::default()
        };
        let recenterer = Recenterer::new(&reference, &matrix, &coverage, options);
        let peak = PeakInterval::new("chr1", 150, 250).unwrap();
        let peak = centered(recenterer.process(&peak).unwrap().0);

        assert_eq!(
            peak.to_bed_row().unwrap(),
            "chr1\t198\t208\tCCTGATAGCC\t1.00\t+\t0\t0\t255,0,0"
        );
        assert_eq!(peak.fasta_id(), "chr1|198");
    }

    #[test]
    fn run_writes_records_in_peak_order() {
        let reference = reference_with(2000, &[(1100, "TGATAG"), (300, "TGATAG")]);
        let matrix = gata1();
        let coverage = CoverageMap::new();
        let recenterer =
            Recenterer::new(&reference, &matrix, &coverage, RecenterOptions::default());
        let peaks = vec![
            PeakInterval::new("chr1", 1000, 1200).unwrap(),
            PeakInterval::new("chr1", 1500, 1504).unwrap(),
            PeakInterval::new("chr1", 250, 350).unwrap(),
        ];

        let mut bed = Vec::new();
        let mut fasta = Vec::new();
        let summary = recenterer.run(&peaks, &mut bed, &mut fasta).unwrap();

        assert_eq!(
            summary,
            RecenterSummary {
                peaks: 3,
                emitted: 2,
                no_hits: 1,
                ..RecenterSummary::default()
            }
        );
        let bed = String::from_utf8(bed).unwrap();
        let starts: Vec<_> = bed
            .lines()
            .map(|line| line.split('\t').nth(1).unwrap())
            .collect();
        assert_eq!(starts, vec!["1000", "200"]);

        let fasta = String::from_utf8(fasta).unwrap();
        let lines: Vec<_> = fasta.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ">chr1|1000");
        assert_eq!(lines[1].len(), 206);
        assert_eq!(lines[2], ">chr1|200");
    }

    #[test]
    fn run_keeps_order_across_chunks() {
        let sites: Vec<usize> = (0..45).map(|k| 150 + 100 * k).collect();
        let planted: Vec<(usize, &str)> = sites.iter().map(|site| (*site, "TGATAG")).collect();
        let reference = reference_with(5000, &planted);
        let matrix = gata1();
        let coverage = CoverageMap::new();
        let recenterer =
            Recenterer::new(&reference, &matrix, &coverage, RecenterOptions::default());
        let peaks: Vec<PeakInterval> = (0..2 * WRITE_CHUNK + 1)
            .map(|i| {
                let k = (i % sites.len()) as u64;
                PeakInterval::new("chr1", 120 + 100 * k, 190 + 100 * k).unwrap()
            })
            .collect();

        let mut bed = Vec::new();
        let summary = recenterer.run(&peaks, &mut bed, Vec::new()).unwrap();
        assert_eq!(summary.emitted, peaks.len());

        let bed = String::from_utf8(bed).unwrap();
        let starts: Vec<u64> = bed
            .lines()
            .map(|line| line.split('\t').nth(1).unwrap().parse().unwrap())
            .collect();
        let expected: Vec<u64> = (0..peaks.len())
            .map(|i| 50 + 100 * (i % sites.len()) as u64)
            .collect();
        assert_eq!(starts, expected);
    }

    #[test]
    fn unknown_chromosome_is_an_error() {
        let reference = reference_with(400, &[]);
        let matrix = gata1();
        let coverage = CoverageMap::new();
        let recenterer =
            Recenterer::new(&reference, &matrix, &coverage, RecenterOptions::default());
        let peak = PeakInterval::new("chr2", 10, 60).unwrap();
        assert!(recenterer.process(&peak).is_err());
    }
}
