#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Calls ChIP-seq peaks with MACS2 and recenters them on the best hit of a position weight matrix.
mod cli;

use chipshot::alignment::coverage_from_paths;
use chipshot::error::Error;
use chipshot::genomic::{peaks_from_path, ReferenceSequence};
use chipshot::motif::ScoringMatrix;
use chipshot::peak_caller::PeakCaller;
use chipshot::recenter::Recenterer;
use chipshot::{Result, CENTERED_BED_SUFFIX, CENTERED_FASTA_SUFFIX};
use log::info;
use std::{fs::File, io::BufWriter};
use structopt::StructOpt;

fn main() -> Result<()> {
    let opt = cli::ChipShot::from_args();
    opt.set_logging();

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build_global()
        .map_err(|_| Error::ThreadError)?;

    let reference = ReferenceSequence::from_path(&opt.reference)?;
    let matrix = ScoringMatrix::from_path(&opt.pfm)?;

    let peaks_path = match opt.peaks {
        Some(ref path) => path.clone(),
        None => {
            let genome_size = opt
                .genome_size
                .unwrap_or_else(|| reference.effective_genome_size());
            info!("Effective genome size is {}", genome_size);
            PeakCaller::new(genome_size, opt.output.as_str(), opt.treatment.clone())
                .program(&opt.macs2)
                .control(opt.control.clone())
                .extra_args(opt.macs_args.clone())
                .run()?
        }
    };

    info!("Calculating coverage for treatment sample...");
    let coverage_inputs = opt.coverage_inputs();
    if coverage_inputs.len() < opt.treatment.len() {
        info!(
            "Using {} for coverage, pass --pool-treatments to count all treatment files",
            coverage_inputs[0].display()
        );
    }
    let (coverage, _) = coverage_from_paths(coverage_inputs, opt.threads)?;

    info!("Recentering ChIP-seq peaks...");
    let peaks = peaks_from_path(&peaks_path)?;
    let bed = BufWriter::new(File::create(format!(
        "{}{}",
        opt.output, CENTERED_BED_SUFFIX
    ))?);
    let fasta = File::create(format!("{}{}", opt.output, CENTERED_FASTA_SUFFIX))?;

    let recenterer = Recenterer::new(&reference, &matrix, &coverage, opt.recenter_options());
    let summary = recenterer.run(&peaks, bed, fasta)?;
    summary.report();

    Ok(())
}
