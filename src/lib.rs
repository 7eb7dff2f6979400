//! Wipe Tower G-code
//!
//! Generates the purge and prime moves of a single-extruder multi-material
//! printer at every toolchange, printed onto a wipe tower next to the
//! object.
//!
//! This library provides:
//! - A diff-aware G-code writer
//! - Material motion tables and the five-phase toolchange sequence
//! - Tower layout: bands, first layer brim, idle layer fill
//! - A job runner, output inspection and the CLI configuration

pub mod analysis;
pub mod cli;
pub mod config;
pub mod geometry;
pub mod job;
pub mod material;
pub mod parser;
pub mod tower;
pub mod writer;

pub use analysis::{Inspection, inspect};
pub use config::Config;
pub use geometry::{BoxCoordinates, Point};
pub use job::{Job, JobOutput, run_job};
pub use material::{MaterialType, MotionProfile, parse_material};
pub use parser::{ParsedLine, parse_line};
pub use tower::{ToolChange, ToolChangeResult, TowerConfig, WipeShape, WipeTower};
pub use writer::Writer;
