use std::path::PathBuf;

use calodigi::{
    cluster::{JetAlgorithm, JetDefinition},
    compression::Compression,
};
use clap::{ArgAction, Parser};

/// Parse a boolean switch given as `0`, `1`, `true`, or `false`
fn parse_switch(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        _ => Err(format!("Expected 0, 1, true, or false, got '{s}'")),
    }
}

#[derive(Debug, Parser)]
#[clap(about, author, version)]
pub(crate) struct Opt {
    /// Number of events to digitise. '0' means all events.
    #[clap(name = "NEVENTS")]
    pub(crate) nevents: usize,

    /// Input file with simulated hits.
    #[clap(name = "INFILE", value_parser)]
    pub(crate) infile: PathBuf,

    /// Output directory.
    #[clap(name = "OUTDIR", value_parser)]
    pub(crate) outdir: PathBuf,

    #[clap(
        name = "GRANULARITIES",
        help = "Cell merging factor per layer.
Format is 'layer:value' or 'first-last:value', separated by commas,
e.g. '0-19:1,20-29:2'. Layers not mentioned default to 1."
    )]
    pub(crate) granularities: String,

    #[clap(
        name = "NOISE",
        help = "Noise in MIPs per layer.
Same format as GRANULARITIES. Layers not mentioned default to 0.1."
    )]
    pub(crate) noise: String,

    #[clap(
        name = "THRESHOLDS",
        help = "Thresholds in ADC counts per layer.
Same format as GRANULARITIES. Layers not mentioned default to 25."
    )]
    pub(crate) thresholds: String,

    /// Random number generator seed for noise.
    #[clap(name = "SEED", default_value_t = 0)]
    pub(crate) seed: u64,

    /// Debug level. '1' shows debug output, '2' or higher trace output.
    #[clap(name = "DEBUG", default_value_t = 0)]
    pub(crate) debug: u32,

    /// Whether to save all digitised hits, regardless of threshold.
    #[clap(
        name = "SAVE_DIGIS",
        value_parser = parse_switch,
        action = ArgAction::Set,
        default_value = "0"
    )]
    pub(crate) save_digis: bool,

    /// Whether to save the simulated hits.
    #[clap(
        name = "SAVE_SIMS",
        value_parser = parse_switch,
        action = ArgAction::Set,
        default_value = "1"
    )]
    pub(crate) save_sims: bool,

    /// Whether to cluster jets.
    #[clap(
        name = "MAKE_JETS",
        value_parser = parse_switch,
        action = ArgAction::Set,
        default_value = "0"
    )]
    pub(crate) make_jets: bool,

    /// YAML file with detector response settings.
    #[clap(long, value_parser)]
    pub(crate) settings: Option<PathBuf>,

    #[clap(long,
                help = "Compress output file.
Possible settings are 'bzip2', 'gzip', 'zstd', 'lz4'.
Compression levels can be set with algorithm_level e.g. 'zstd_5'.
Maximum levels are 'gzip_9', 'zstd_19', 'lz4_16'.")]
    pub(crate) compression: Option<Compression>,

    #[clap(
        long,
        default_value = "anti-kt",
        help = "Jet algorithm.
Possible settings are 'anti-kt', 'kt', 'Cambridge-Aachen'."
    )]
    pub(crate) jet_algorithm: JetAlgorithm,

    /// Jet radius parameter.
    #[clap(long, default_value = "0.5")]
    pub(crate) jet_radius: f64,

    /// Minimum jet transverse momentum.
    #[clap(long, default_value = "0.")]
    pub(crate) jet_pt: f64,

    /// Verbosity level
    #[clap(
        short,
        long,
        help = "Verbosity level, overriding DEBUG.
Possible values with increasing amount of output are
'off', 'error', 'warn', 'info', 'debug', 'trace'.\n"
    )]
    pub(crate) loglevel: Option<String>,
}

impl Opt {
    /// Log level, either set explicitly or derived from the debug level
    pub(crate) fn loglevel(&self) -> &str {
        if let Some(level) = &self.loglevel {
            return level;
        }
        match self.debug {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    pub(crate) fn jet_def(&self) -> Option<JetDefinition> {
        self.make_jets.then_some(JetDefinition {
            algorithm: self.jet_algorithm,
            radius: self.jet_radius,
            min_pt: self.jet_pt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional() {
        let opt = Opt::try_parse_from([
            "calodigi", "10", "in.jsonl", "out", "", "0-2:0.2", "1:30",
        ])
        .unwrap();
        assert_eq!(opt.nevents, 10);
        assert_eq!(opt.granularities, "");
        assert_eq!(opt.seed, 0);
        assert!(!opt.save_digis);
        assert!(opt.save_sims);
        assert!(opt.jet_def().is_none());
        assert_eq!(opt.loglevel(), "info");

        let opt = Opt::try_parse_from([
            "calodigi", "0", "in.jsonl", "out", "", "", "", "42", "2", "true",
            "0", "1", "--jet-radius", "0.4",
        ])
        .unwrap();
        assert_eq!(opt.seed, 42);
        assert_eq!(opt.loglevel(), "trace");
        assert!(opt.save_digis);
        assert!(!opt.save_sims);
        assert_eq!(opt.jet_def().unwrap().radius, 0.4);
    }

    #[test]
    fn invalid() {
        assert!(Opt::try_parse_from(["calodigi", "10", "in.jsonl"]).is_err());
        assert!(Opt::try_parse_from([
            "calodigi", "10", "in.jsonl", "out", "", "", "", "0", "0", "yes"
        ])
        .is_err());
    }
}
