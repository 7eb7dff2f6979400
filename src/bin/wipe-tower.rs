use anyhow::Result;

fn main() -> Result<()> {
    wipe_tower_gcode::cli::run()
}
