//! Command line front end
//!
//! Loads a job file, resolves the tower settings and prints the generated
//! G-code, or a JSON report with an inspection of it, to stdout.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::io::Write;

use crate::analysis::{Inspection, Severity, inspect};
use crate::config::Config;
use crate::job::{Job, JobOutput, run_job};
use crate::tower::TowerConfig;

/// JSON report printed with `--json`
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub seed: u64,
    pub tower: &'a TowerConfig,
    #[serde(flatten)]
    pub output: &'a JobOutput,
    pub inspection: &'a Inspection,
}

/// Entry point of the `wipe-tower` binary
pub fn run() -> Result<()> {
    let config = Config::from_args_and_env()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    let job = Job::load(&config.job_path)?;
    let tower = config.tower_config(job.tower.as_ref())?;
    let seed = config.seed.or(job.seed).unwrap_or(0);
    log::info!("job {} with seed {}", config.job_path.display(), seed);

    let output = run_job(&job, tower.clone(), &mut StdRng::seed_from_u64(seed));
    let inspection = inspect(&output.gcode);
    for diagnostic in &inspection.diagnostics.diagnostics {
        if diagnostic.severity == Severity::Error {
            log::warn!("line {}: {}", diagnostic.line, diagnostic.message);
        }
    }

    let mut stdout = std::io::stdout().lock();
    if config.json {
        let report = Report {
            seed,
            tower: &tower,
            output: &output,
            inspection: &inspection,
        };
        serde_json::to_writer_pretty(&mut stdout, &report).context("Failed to write report")?;
        writeln!(stdout)?;
    } else {
        stdout
            .write_all(output.gcode.as_bytes())
            .context("Failed to write G-code")?;
    }
    Ok(())
}
