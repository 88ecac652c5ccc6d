use crate::error::Error;
use crate::{Result, NUCLEOTIDES, PSEUDOCOUNT};
use log::{debug, info};
use std::{
    cmp::Ordering,
    fmt,
    io::{self, BufRead},
    path::Path,
};

/// Uniform background frequency for each nucleotide
const BACKGROUND: f64 = 0.25;

/// Strand of a motif hit relative to the reference
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Strand {
    /// Matrix matches the reference sequence as is
    Forward,
    /// Matrix matches the reverse complement of the reference
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// Single scored window. `offset` is the leftmost base of the window relative to the scanned
/// sequence for both strands.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct MotifHit {
    pub offset: u64,
    pub strand: Strand,
    pub score: f64,
}

/// Hits of a scan sorted by descending score, ties keep scan order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Scan {
    /// Scored windows
    pub hits: Vec<MotifHit>,
    /// Windows containing a symbol outside `ACGT`
    pub unscorable: usize,
}

impl Scan {
    /// Best scoring hit
    pub fn best(&self) -> Option<&MotifHit> {
        self.hits.first()
    }
}

/// Log-odds scoring matrix built from a position frequency matrix
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringMatrix {
    name: Option<String>,
    scores: Vec<[f64; 4]>,
    consensus: Vec<u8>,
}

impl ScoringMatrix {
    /// Builds the matrix from per-position counts in `A, C, G, T` order. Counts are smoothed
    /// with [`PSEUDOCOUNT`] and converted to `log2(p / 0.25)`. The consensus takes the most
    /// frequent nucleotide at each position, ties going to the first in `ACGT` order.
    pub fn from_counts(counts: &[[f64; 4]]) -> Result<Self> {
        if counts.is_empty() {
            return Err(Error::InvalidMatrix("matrix has no positions".to_string()));
        }

        let mut scores = Vec::with_capacity(counts.len());
        let mut consensus = Vec::with_capacity(counts.len());
        for (pos, column) in counts.iter().enumerate() {
            if column.iter().any(|count| !count.is_finite() || *count < 0.0) {
                return Err(Error::InvalidMatrix(format!(
                    "counts at position {} must be finite and non-negative",
                    pos + 1
                )));
            }
            let total = column.iter().sum::<f64>() + PSEUDOCOUNT * 4.0;

            let mut log_odds = [0.0; 4];
            for (score, count) in log_odds.iter_mut().zip(column.iter()) {
                *score = ((count + PSEUDOCOUNT) / total / BACKGROUND).log2();
            }
            scores.push(log_odds);

            let mut best = 0;
            for idx in 1..4 {
                if column[idx] > column[best] {
                    best = idx;
                }
            }
            consensus.push(NUCLEOTIDES[best]);
        }

        Ok(Self {
            name: None,
            scores,
            consensus,
        })
    }

    /// Reads the first motif of a possibly compressed JASPAR or raw PFM file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Reading frequency matrix {}...", path.as_ref().display());
        let (rdr, _) = niffler::from_path(path)?;
        Self::from_reader(io::BufReader::new(rdr))
    }

    /// Parses the first motif of a JASPAR (`>ID name` header, `A [ 1 2 3 ]` rows) or raw PFM
    /// (four unlabeled rows in `ACGT` order) stream
    pub fn from_reader<R: BufRead>(rdr: R) -> Result<Self> {
        let mut name = None;
        let mut rows: [Option<Vec<f64>>; 4] = [None, None, None, None];
        let mut unlabeled = 0;

        for (i, line) in rdr.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('>') {
                if rows.iter().any(Option::is_some) {
                    debug!("Ignoring matrices after the first at line {}", i + 1);
                    break;
                }
                name = header.split_whitespace().next().map(str::to_string);
                continue;
            }

            let (idx, values) = match line.chars().next() {
                Some(c) if c.is_ascii_alphabetic() => {
                    let symbol = c.to_ascii_uppercase() as u8;
                    let idx = nuc_index(symbol).ok_or_else(|| {
                        Error::InvalidMatrix(format!("unknown symbol {} at line {}", c, i + 1))
                    })?;
                    (idx, &line[1..])
                }
                _ => {
                    let idx = unlabeled;
                    unlabeled += 1;
                    (idx, line)
                }
            };

            if idx >= 4 {
                return Err(Error::InvalidMatrix(format!(
                    "more than four rows at line {}",
                    i + 1
                )));
            }
            if rows[idx].is_some() {
                return Err(Error::InvalidMatrix(format!(
                    "row for {} given twice at line {}",
                    NUCLEOTIDES[idx] as char,
                    i + 1
                )));
            }
            rows[idx] = Some(parse_counts(values, i + 1)?);
        }

        let mut columns: Vec<[f64; 4]> = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            let row = row.as_ref().ok_or_else(|| {
                Error::InvalidMatrix(format!("missing row for {}", NUCLEOTIDES[idx] as char))
            })?;
            if idx == 0 {
                columns = vec![[0.0; 4]; row.len()];
            } else if row.len() != columns.len() {
                return Err(Error::InvalidMatrix(format!(
                    "row for {} has {} columns, expected {}",
                    NUCLEOTIDES[idx] as char,
                    row.len(),
                    columns.len()
                )));
            }
            for (column, count) in columns.iter_mut().zip(row) {
                column[idx] = *count;
            }
        }

        let mut matrix = Self::from_counts(&columns)?;
        debug!(
            "Matrix {} of width {} with consensus {}",
            name.as_deref().unwrap_or("<unnamed>"),
            matrix.width(),
            String::from_utf8_lossy(&matrix.consensus)
        );
        matrix.name = name;
        Ok(matrix)
    }

    /// Motif identifier from the JASPAR header, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of positions, always at least one
    pub fn width(&self) -> usize {
        self.scores.len()
    }

    /// Most frequent nucleotide at each position
    pub fn consensus(&self) -> &[u8] {
        &self.consensus
    }

    /// Log-odds score of `nuc` at matrix position `pos`
    pub fn score_at(&self, pos: usize, nuc: u8) -> Option<f64> {
        self.scores
            .get(pos)
            .and_then(|column| nuc_index(nuc).map(|idx| column[idx]))
    }

    /// Scores a window of exactly [`width`](Self::width) bases on the given strand. Returns
    /// `None` when the window has the wrong length or contains a symbol outside `ACGT`.
    pub fn score_window(&self, window: &[u8], strand: Strand) -> Option<f64> {
        if window.len() != self.width() {
            return None;
        }
        let last = self.width() - 1;
        window
            .iter()
            .enumerate()
            .try_fold(0.0, |total, (pos, nuc)| {
                let idx = nuc_index(*nuc)?;
                let score = match strand {
                    Strand::Forward => self.scores[pos][idx],
                    Strand::Reverse => self.scores[last - pos][3 - idx],
                };
                Some(total + score)
            })
    }

    /// Scores every window of `seq` on the forward strand and then on the reverse strand.
    /// Hits below `min_score` are discarded.
    pub fn scan(&self, seq: &[u8], min_score: Option<f64>) -> Scan {
        let width = self.width();
        let mut scan = Scan::default();
        if seq.len() < width {
            return scan;
        }

        let mut reverse = Vec::new();
        for (offset, window) in seq.windows(width).enumerate() {
            let forward_score = self.score_window(window, Strand::Forward);
            let reverse_score = self.score_window(window, Strand::Reverse);
            match (forward_score, reverse_score) {
                (Some(forward_score), Some(reverse_score)) => {
                    scan.hits.push(MotifHit {
                        offset: offset as u64,
                        strand: Strand::Forward,
                        score: forward_score,
                    });
                    reverse.push(MotifHit {
                        offset: offset as u64,
                        strand: Strand::Reverse,
                        score: reverse_score,
                    });
                }
                _ => scan.unscorable += 1,
            }
        }
        scan.hits.append(&mut reverse);

        if let Some(min_score) = min_score {
            scan.hits.retain(|hit| hit.score >= min_score);
        }
        scan.hits.sort_by(|a, b| descending(a.score, b.score));
        scan
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Column of a nucleotide in the matrix, `None` for anything but `ACGT` in either case
fn nuc_index(nuc: u8) -> Option<usize> {
    match nuc {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

fn parse_counts(values: &str, line: usize) -> Result<Vec<f64>> {
    values
        .split(|c: char| c.is_whitespace() || c == '[' || c == ']' || c == ':' || c == ',')
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<f64>().map_err(|_| {
                Error::InvalidMatrix(format!("invalid count `{}` at line {}", value, line))
            })
        })
        .collect()
}
