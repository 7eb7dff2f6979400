//! Configuration management for the wipe tower command line tool.
//!
//! Handles:
//! - Command-line argument parsing
//! - Tower settings lookup (explicit file, job file, user config directory)

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use crate::tower::TowerConfig;

/// Command-line arguments for the wipe tower generator
#[derive(Debug, Parser)]
#[command(name = "wipe-tower")]
#[command(about = "Generate wipe tower toolchange G-code from a job file")]
#[command(version)]
pub struct Args {
    /// Job file describing the layers and toolchanges to generate
    #[arg(help = "TOML job file")]
    pub job: PathBuf,

    /// Tower settings file, takes precedence over the job's [tower] table
    #[arg(long, help = "TOML file with tower settings")]
    pub tower: Option<PathBuf>,

    /// Seed for the idle layer jitter
    #[arg(long, help = "Random seed (overrides the job's seed)")]
    pub seed: Option<u64>,

    /// Print a JSON report instead of raw G-code
    #[arg(long)]
    pub json: bool,

    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub job_path: PathBuf,
    /// Tower settings file given on the command line
    pub tower_path: Option<PathBuf>,
    /// `<config_dir>/wipe-tower/tower.toml`, if the platform has a config dir
    pub user_tower_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub json: bool,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        let user_tower_path =
            dirs::config_dir().map(|dir| dir.join("wipe-tower").join("tower.toml"));

        Ok(Config {
            job_path: args.job,
            tower_path: args.tower,
            user_tower_path,
            seed: args.seed,
            json: args.json,
            log_level: args.log_level,
        })
    }

    /// Resolve the tower settings
    ///
    /// Order: `--tower`, the job's `[tower]` table, the user config file,
    /// built-in defaults. A missing user config file is not an error; an
    /// unreadable explicit one is.
    pub fn tower_config(&self, from_job: Option<&TowerConfig>) -> Result<TowerConfig> {
        if let Some(path) = &self.tower_path {
            log::debug!("tower settings from {}", path.display());
            return load_tower_config(path);
        }
        if let Some(config) = from_job {
            log::debug!("tower settings from job file");
            return Ok(config.clone());
        }
        if let Some(path) = self.user_tower_path.as_deref().filter(|p| p.is_file()) {
            log::debug!("tower settings from {}", path.display());
            return load_tower_config(path);
        }
        log::debug!("using default tower settings");
        Ok(TowerConfig::default())
    }
}

/// Read tower settings from a TOML file
pub fn load_tower_config(path: &Path) -> Result<TowerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tower settings {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse tower settings {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(tower_path: Option<PathBuf>, user_tower_path: Option<PathBuf>) -> Config {
        Config {
            job_path: PathBuf::from("job.toml"),
            tower_path,
            user_tower_path,
            seed: None,
            json: false,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn parse_arguments() {
        let args = Args::try_parse_from([
            "wipe-tower",
            "job.toml",
            "--seed",
            "42",
            "--json",
            "--log-level",
            "debug",
        ])
        .expect("parse args");
        let config = Config::from_args(args).expect("config");
        assert_eq!(config.job_path, PathBuf::from("job.toml"));
        assert_eq!(config.seed, Some(42));
        assert!(config.json);
        assert_eq!(config.log_level, "debug");
        assert!(config.tower_path.is_none());
    }

    #[test]
    fn job_path_is_required() {
        assert!(Args::try_parse_from(["wipe-tower"]).is_err());
    }

    #[test]
    fn job_tower_beats_defaults() {
        let job_tower = TowerConfig {
            width: 42.0,
            ..TowerConfig::default()
        };
        let config = config_with(None, None);
        let tower = config.tower_config(Some(&job_tower)).expect("tower");
        assert_eq!(tower.width, 42.0);
    }

    #[test]
    fn missing_user_file_falls_back_to_defaults() {
        let config = config_with(None, Some(PathBuf::from("/nonexistent/tower.toml")));
        let tower = config.tower_config(None).expect("tower");
        assert_eq!(tower, TowerConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let config = config_with(Some(PathBuf::from("/nonexistent/tower.toml")), None);
        let err = config.tower_config(None).unwrap_err();
        assert!(err.to_string().contains("Failed to read tower settings"));
    }
}
