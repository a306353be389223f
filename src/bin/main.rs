mod opt;

use crate::opt::Opt;

use anyhow::{Context, Result};
use calodigi::{
    digitisation::{DigitisationSettings, Digitiser},
    layer_config::LayerConfig,
    prelude::*,
    GIT_BRANCH, GIT_REV, VERSION,
};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn main() -> Result<()> {
    let args = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )
    .with_context(|| "Failed to read argument file")?;
    let opt = match Opt::try_parse_from(args) {
        Ok(opt) => opt,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            // nothing sensible left to do if printing the usage fails
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let env = Env::default().filter_or("CALODIGI_LOG", opt.loglevel());
    env_logger::init_from_env(env);

    if let (Some(rev), Some(branch)) = (GIT_REV, GIT_BRANCH) {
        info!("calodigi {VERSION} rev {rev} ({branch})");
    } else {
        info!("calodigi {VERSION}");
    }
    debug!("settings: {:#?}", opt);

    let settings = match &opt.settings {
        Some(file) => DigitisationSettings::from_file(file).with_context(
            || format!("Failed to read digitisation settings from {file:?}"),
        )?,
        None => DigitisationSettings::default(),
    };
    debug!("Digitisation settings: {settings:#?}");

    let reader = FileReader::open(&opt.infile)
        .with_context(|| format!("Failed to open {:?}", opt.infile))?;
    let header = reader.header().clone();
    for (subdet, calib) in header
        .detector
        .subdetectors()
        .iter()
        .zip(header.calibration.iter())
    {
        info!(
            "{} ({}): layers {} to {}, {calib}",
            subdet.kind,
            subdet.sensor,
            subdet.layer_id_min,
            subdet.layer_id_max - 1,
        );
    }

    let layer_config = LayerConfig::from_strs(
        header.detector.nlayers(),
        &opt.granularities,
        &opt.noise,
        &opt.thresholds,
    )
    .context("Invalid layer configuration")?;
    info!("Layer configuration:\n{layer_config}");

    let rng = Xoshiro256Plus::seed_from_u64(opt.seed);
    let digitiser = Digitiser::new(settings, rng);

    let options = RunOptions {
        max_events: opt.nevents,
        save_sim_hits: opt.save_sims,
        save_digi_hits: opt.save_digis,
        jet_def: opt.jet_def(),
        seed: opt.seed,
        expected_events: header.nevents,
    };
    let pipeline = DigiPipelineBuilder {
        reader,
        writer: (),
        digitiser,
        detector: header.detector,
        calibration: header.calibration,
        layer_config,
        cell_size: header.cell_size,
        xy_width: header.xy_width,
        options,
    }
    .build()?;

    let file_writer = FileWriter::builder()
        .outdir(opt.outdir.clone())
        .compression(opt.compression)
        .save_digi_hits(opt.save_digis)
        .save_sim_hits(opt.save_sims)
        .build();
    let writer = file_writer.create()?;
    info!("Writing output to {:?}", file_writer.filename());

    let summary = pipeline.with_writer(writer).run()?;
    info!(
        "Wrote {} events with {} reco hits and {} jets",
        summary.nevents, summary.nreco_hits, summary.njets
    );
    info!("done");
    Ok(())
}
