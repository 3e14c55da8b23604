// ==============================================================================
// config.rs - Run Configuration
// ==============================================================================
// Description: Command line arguments and validated run settings
// Author: Matt Barham
// Created: 2026-10-05
// Modified: 2026-10-16
// Version: 0.2.0
// ==============================================================================

use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::metrics::DerivedParams;
use crate::output::OutputFormat;

pub const DEFAULT_CALL_RATE_PF_THRESHOLD: f64 = 0.98;

/// Run configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Call rate threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("{kind} file is not readable: {path}")]
    MissingFile { kind: &'static str, path: String },

    #[error("Output directory does not exist: {0}")]
    MissingOutputDirectory(String),
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Collect summary and per-sample metrics from a genotyping arrays VCF", long_about = None)]
pub struct Args {
    /// Input arrays VCF (.vcf or .vcf.gz)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output path prefix; report extensions are appended
    #[arg(short, long)]
    pub output: PathBuf,

    /// dbSNP sites VCF
    #[arg(long)]
    pub dbsnp: PathBuf,

    /// VCF whose header lists the contigs; defaults to the input header
    #[arg(long)]
    pub sequence_dictionary: Option<PathBuf>,

    /// A sample passes when its call rate is above this value
    #[arg(long, env = "CALL_RATE_PF_THRESHOLD", default_value_t = DEFAULT_CALL_RATE_PF_THRESHOLD)]
    pub call_rate_pf_threshold: f64,

    /// Worker threads: 0 = all cores, negative = leave that many cores free
    #[arg(long, env = "NUM_PROCESSORS", default_value_t = 0, allow_negative_numbers = true)]
    pub num_processors: i32,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    pub format: OutputFormat,
}

/// Validated settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output_prefix: PathBuf,
    pub dbsnp: PathBuf,
    pub sequence_dictionary: Option<PathBuf>,
    pub params: DerivedParams,
    pub worker_count: usize,
    pub format: OutputFormat,
}

impl RunConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let params = validate_threshold(args.call_rate_pf_threshold)?;

        require_file("Input VCF", &args.input)?;
        require_file("dbSNP", &args.dbsnp)?;
        if let Some(dictionary) = &args.sequence_dictionary {
            require_file("Sequence dictionary", dictionary)?;
        }

        if let Some(parent) = args.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConfigError::MissingOutputDirectory(parent.display().to_string()));
            }
        }

        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Ok(Self {
            input: args.input,
            output_prefix: args.output,
            dbsnp: args.dbsnp,
            sequence_dictionary: args.sequence_dictionary,
            params,
            worker_count: resolve_worker_count(args.num_processors, available),
            format: args.format,
        })
    }
}

pub fn validate_threshold(threshold: f64) -> Result<DerivedParams, ConfigError> {
    DerivedParams::new(threshold).map_err(|_| ConfigError::InvalidThreshold(threshold))
}

/// 0 → all cores, n > 0 → n, n < 0 → cores - |n|; never below 1
pub fn resolve_worker_count(requested: i32, available: usize) -> usize {
    let available = available.max(1);
    let count = match requested {
        0 => available,
        n if n > 0 => n as usize,
        n => available.saturating_sub(n.unsigned_abs() as usize),
    };
    count.max(1)
}

fn require_file(kind: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingFile {
            kind,
            path: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(dir: &Path) -> Args {
        let input = dir.join("input.vcf");
        let dbsnp = dir.join("dbsnp.vcf");
        std::fs::write(&input, "##fileformat=VCFv4.2\n").unwrap();
        std::fs::write(&dbsnp, "##fileformat=VCFv4.2\n").unwrap();

        Args {
            input,
            output: dir.join("out"),
            dbsnp,
            sequence_dictionary: None,
            call_rate_pf_threshold: DEFAULT_CALL_RATE_PF_THRESHOLD,
            num_processors: 2,
            format: OutputFormat::Tsv,
        }
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(resolve_worker_count(0, 8), 8);
        assert_eq!(resolve_worker_count(3, 8), 3);
        assert_eq!(resolve_worker_count(-2, 8), 6);
        assert_eq!(resolve_worker_count(-8, 8), 1);
        assert_eq!(resolve_worker_count(-100, 8), 1);
        assert_eq!(resolve_worker_count(0, 0), 1);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.98).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert_eq!(validate_threshold(0.0), Err(ConfigError::InvalidThreshold(0.0)));
        assert!(validate_threshold(1.5).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_from_args() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::from_args(args(dir.path())).unwrap();

        assert_eq!(config.worker_count, 2);
        assert_eq!(config.params.call_rate_pf_threshold, 0.98);
        assert_eq!(config.output_prefix, dir.path().join("out"));
    }

    #[test]
    fn test_from_args_rejects_missing_files() {
        let dir = TempDir::new().unwrap();

        let mut missing_input = args(dir.path());
        missing_input.input = dir.path().join("nope.vcf");
        assert!(matches!(
            RunConfig::from_args(missing_input),
            Err(ConfigError::MissingFile { kind: "Input VCF", .. })
        ));

        let mut bad_output = args(dir.path());
        bad_output.output = dir.path().join("missing/out");
        assert!(matches!(
            RunConfig::from_args(bad_output),
            Err(ConfigError::MissingOutputDirectory(_))
        ));
    }

    #[test]
    fn test_cli_parsing() {
        let args = Args::try_parse_from([
            "arrays-metrics",
            "-i",
            "in.vcf",
            "-o",
            "out/prefix",
            "--dbsnp",
            "dbsnp.vcf",
            "--num-processors",
            "-1",
            "--format",
            "all",
        ])
        .unwrap();

        assert_eq!(args.num_processors, -1);
        assert_eq!(args.format, OutputFormat::All);
        assert!(args.sequence_dictionary.is_none());
    }
}
