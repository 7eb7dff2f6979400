//! Job files and tower settings loaded from disk
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use tempfile::TempDir;
use wipe_tower_gcode::config::{Args, Config, load_tower_config};
use wipe_tower_gcode::{Job, inspect, run_job};

const JOB: &str = r#"
seed = 11

[tower]
x = 180.0
y = 130.0
width = 50.0

[[layers]]
z = 0.2
first_layer = true
brim = { side_only = false, y_offset = 0.0 }

[[layers.toolchanges]]
tool = 1
current_material = "PLA"
new_material = "scaff"
temperature = 220
space_available = 10.0
wipe_start_y = 0.0

[layers.idle]
order = 1
total = 4

[[layers]]
z = 0.4

[[layers.toolchanges]]
tool = 0
current_material = "SCAFF"
new_material = "PLA"
shape = "reversed"
space_available = 10.0
wipe_start_y = 0.0
last_in_file = true
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write file");
    path
}

fn config_for(args: &[&str]) -> Config {
    let mut argv = vec!["wipe-tower"];
    argv.extend_from_slice(args);
    Config::from_args(Args::try_parse_from(argv).expect("parse args")).expect("config")
}

#[test]
fn load_and_run_job_file() {
    let dir = TempDir::new().expect("temp dir");
    let job_path = write(&dir, "job.toml", JOB);

    let job = Job::load(&job_path).expect("load job");
    assert_eq!(job.seed, Some(11));
    assert_eq!(job.toolchange_count(), 2);

    let config = config_for(&[job_path.to_str().expect("utf-8 path")]);
    let tower = config.tower_config(job.tower.as_ref()).expect("tower");
    assert_eq!(tower.x, 180.0);
    assert_eq!(tower.width, 50.0);

    let output = run_job(&job, tower, &mut StdRng::seed_from_u64(11));
    let inspection = inspect(&output.gcode);
    assert!(inspection.diagnostics.is_valid());
    assert!(inspection.has_marker("WIPE TOWER FIRST LAYER BRIM START"));
    assert!(inspection.has_marker("EMPTY GRID END"));
    assert_eq!(inspection.toolchange_numbers, [1, 2]);
    assert_eq!(inspection.tools, [1]);
    assert!(output.gcode.contains("M104 S220\n"));
    assert!(output.gcode.contains("M220 S35\n"));
}

#[test]
fn explicit_tower_file_overrides_job() {
    let dir = TempDir::new().expect("temp dir");
    let job_path = write(&dir, "job.toml", JOB);
    let tower_path = write(&dir, "tower.toml", "x = 10.0\nperimeter_width = 0.45\n");

    let config = config_for(&[
        job_path.to_str().expect("utf-8 path"),
        "--tower",
        tower_path.to_str().expect("utf-8 path"),
    ]);
    let job = Job::load(&job_path).expect("load job");
    let tower = config.tower_config(job.tower.as_ref()).expect("tower");

    assert_eq!(tower.x, 10.0);
    assert_eq!(tower.perimeter_width, 0.45);
    // Unset fields come from the defaults, not from the job
    assert_eq!(tower.width, 60.0);
}

#[test]
fn unknown_material_fails_to_load() {
    let dir = TempDir::new().expect("temp dir");
    let job_path = write(&dir, "job.toml", &JOB.replace("\"scaff\"", "\"wood\""));

    let err = Job::load(&job_path).unwrap_err();
    assert!(err.to_string().contains("Unknown material in layer 0 toolchange 0"));
}

#[test]
fn malformed_files_report_their_path() {
    let dir = TempDir::new().expect("temp dir");
    let job_path = write(&dir, "job.toml", "[[layers]]\nz = \"high\"\n");
    let tower_path = write(&dir, "tower.toml", "width = [1, 2]\n");

    let err = Job::load(&job_path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse job file"));

    let err = load_tower_config(&tower_path).unwrap_err();
    assert!(err.to_string().contains("tower.toml"));
}

#[test]
fn missing_job_file_is_error() {
    let dir = TempDir::new().expect("temp dir");
    let err = Job::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read job file"));
}
