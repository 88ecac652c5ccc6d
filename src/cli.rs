use chipshot::recenter::{BoundaryPolicy, RecenterOptions};
use log::LevelFilter;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "chipshot",
    about = "Call ChIP-seq peaks using MACS2 and recenter the peaks on the best hit from a position weight matrix"
)]
pub(crate) struct ChipShot {
    #[structopt(
        short,
        long,
        help = "Control sequencing run, can be input, IgG pulldown, etc",
        parse(from_os_str)
    )]
    pub control: Option<PathBuf>,
    #[structopt(
        short,
        long,
        help = "Reference genome in FASTA format",
        parse(from_os_str)
    )]
    pub reference: PathBuf,
    #[structopt(
        short,
        long,
        help = "Position frequency matrix from JASPAR for the protein of interest",
        parse(from_os_str)
    )]
    pub pfm: PathBuf,
    #[structopt(short, long, help = "Output file prefix")]
    pub output: String,
    #[structopt(
        short,
        long = "extend",
        help = "Distance to extend on either side of the best hit against the matrix",
        default_value = "100"
    )]
    pub extend: u64,
    #[structopt(
        long,
        help = "Use an existing BED/narrowPeak file instead of calling peaks",
        parse(from_os_str)
    )]
    pub peaks: Option<PathBuf>,
    #[structopt(
        long,
        help = "Peak calling executable",
        default_value = "macs2",
        parse(from_os_str)
    )]
    pub macs2: PathBuf,
    #[structopt(
        short,
        long,
        help = "Effective genome size passed to MACS2 [default: 0.9 * reference length]"
    )]
    pub genome_size: Option<u64>,
    #[structopt(long, help = "Minimum log-odds score for a motif hit to be considered")]
    pub min_score: Option<f64>,
    #[structopt(
        long,
        help = "Clamp re-centered peaks to chromosome bounds instead of dropping them"
    )]
    pub clamp: bool,
    #[structopt(
        long,
        help = "Pool the coverage of all treatment files instead of using the first one"
    )]
    pub pool_treatments: bool,
    #[structopt(short, long, help = "Number of threads", default_value = "1")]
    pub threads: usize,
    #[structopt(
        short,
        long,
        help = "Increase verbosity (-v debug, -vv trace)",
        parse(from_occurrences)
    )]
    pub verbose: u8,
    #[structopt(short, long, help = "Only report errors")]
    pub quiet: bool,
    #[structopt(
        help = "Treatment files (ChIP-ed sample) in BAM/SAM format",
        required = true,
        min_values = 1,
        parse(from_os_str)
    )]
    pub treatment: Vec<PathBuf>,
    #[structopt(help = "Arguments passed on to MACS2, given after `--`", last = true)]
    pub macs_args: Vec<String>,
}

impl ChipShot {
    /// Initialises logging from the verbosity flags
    pub fn set_logging(&self) {
        let level = if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        };
        env_logger::Builder::new().filter_level(level).init();
    }

    /// Treatment files whose reads are counted for the peak coverage
    pub fn coverage_inputs(&self) -> &[PathBuf] {
        if self.pool_treatments {
            &self.treatment
        } else {
            &self.treatment[..self.treatment.len().min(1)]
        }
    }

    /// Settings of the peak recenterer
    pub fn recenter_options(&self) -> RecenterOptions {
        RecenterOptions {
            slop: self.extend,
            boundary: if self.clamp {
                BoundaryPolicy::Clamp
            } else {
                BoundaryPolicy::Skip
            },
            min_score: self.min_score,
        }
    }
}
