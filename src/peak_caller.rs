use crate::error::Error;
use crate::{Result, NARROW_PEAK_SUFFIX};
use log::{debug, info};
use std::{
    ffi::OsString,
    path::PathBuf,
    process::Command,
};

/// Default peak calling executable
pub const DEFAULT_PROGRAM: &str = "macs2";

/// Invocation of `macs2 callpeak` without model building
#[derive(Debug, Clone, PartialEq)]
pub struct PeakCaller {
    program: PathBuf,
    genome_size: u64,
    prefix: String,
    treatments: Vec<PathBuf>,
    control: Option<PathBuf>,
    extra_args: Vec<String>,
}

impl PeakCaller {
    /// Calls peaks on `treatments` with `prefix` used as the `MACS2` experiment name
    pub fn new<S: Into<String>>(genome_size: u64, prefix: S, treatments: Vec<PathBuf>) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            genome_size,
            prefix: prefix.into(),
            treatments,
            control: None,
            extra_args: Vec::new(),
        }
    }

    /// Executable to run instead of `macs2`
    pub fn program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    /// Control sample such as input or IgG pulldown
    pub fn control(mut self, control: Option<PathBuf>) -> Self {
        self.control = control;
        self
    }

    /// Arguments passed to the peak caller unchanged, after all others
    pub fn extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    /// Command line arguments, excluding the program
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "callpeak".into(),
            "--nomodel".into(),
            "-g".into(),
            self.genome_size.to_string().into(),
            "-n".into(),
            self.prefix.clone().into(),
            "-t".into(),
        ];
        args.extend(self.treatments.iter().map(|path| path.clone().into_os_string()));

        if let Some(ref control) = self.control {
            args.push("-c".into());
            args.push(control.clone().into_os_string());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    /// Path of the narrowPeak file the peak caller writes
    pub fn peaks_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.prefix, NARROW_PEAK_SUFFIX))
    }

    /// Runs the peak caller and returns the path of the called peaks
    pub fn run(&self) -> Result<PathBuf> {
        info!("Calling ChIP-seq peaks...");
        let args = self.args();
        debug!("Running {} {:?}", self.program.display(), args);

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|source| Error::PeakCallerSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(Error::PeakCallerFailed {
                program: self.program.clone(),
                code: status.code(),
            });
        }

        let peaks = self.peaks_path();
        if peaks.is_file() {
            Ok(peaks)
        } else {
            Err(Error::MissingPeaksFile(peaks))
        }
    }
}
