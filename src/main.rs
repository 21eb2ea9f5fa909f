use std::path::PathBuf;

use anyhow::{Context, Result};

use wavelet_lab::report::FileReporter;
use wavelet_lab::train::Experiment;
use wavelet_lab::ExperimentConfig;

fn main() -> Result<()> {
    env_logger::init();

    // Optional single argument: path to a JSON config.
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => ExperimentConfig::load(&path)?,
        None => ExperimentConfig::default(),
    };
    log::info!(
        "batch {} × {} samples, {} levels, {} steps on {:?}",
        config.batch_size,
        config.tmax,
        config.levels,
        config.steps,
        config.device
    );

    let mut reporter = FileReporter::new(&config.output_dir)?;
    let mut experiment = Experiment::new(config).context("setting up experiment")?;
    let summary = experiment.run(&mut reporter).map_err(|e| {
        log::error!("run aborted: {e:#}");
        e
    })?;

    log::info!("learned filters: {:?}", summary.filters);
    Ok(())
}
