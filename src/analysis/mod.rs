//! G-code Inspection
//!
//! Replays generated G-code and summarizes what it does: total filament
//! moved, where the nozzle ends up, which tools were selected and which
//! `; CP ...` section markers appeared. Used by the CLI report and by
//! tests that compare toolchanges without matching text line by line.

pub mod engine;

pub use engine::{CheckResult, Diagnostic, Severity, check_line};

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::geometry::Point;
use crate::parser::{ParsedLine, parse_line};

const MARKER_PATTERN: &str = r"^\s*CP\s+(.+?)\s*$";
const HEADER_PATTERN: &str = r"^\s*toolchange\s*#(\d+)\s*$";

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MARKER_PATTERN).expect("marker pattern is a valid regex"));
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(HEADER_PATTERN).expect("header pattern is a valid regex"));

/// Summary of a block of G-code
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inspection {
    /// Net filament moved by `G1` E words
    pub total_extrusion: f32,
    /// Moves with a positive E
    pub extrusion_moves: usize,
    /// XY moves without E
    pub travel_moves: usize,
    pub end_position: Option<Point>,
    /// Lowest and highest XY visited
    pub bounds: Option<(Point, Point)>,
    pub max_feedrate: f32,
    /// Tools in selection order
    pub tools: Vec<u32>,
    /// Text of each `; CP ...` marker, e.g. `TOOLCHANGE START`
    pub markers: Vec<String>,
    /// Numbers from `; toolchange #N` headers
    pub toolchange_numbers: Vec<u32>,
    pub diagnostics: CheckResult,
}

impl Inspection {
    /// Y deltas of every XY move, in order
    pub fn y_steps(gcode: &str) -> Vec<f32> {
        let mut steps = Vec::new();
        let mut last_y: Option<f32> = None;
        for parsed in gcode.lines().map(parse_line) {
            if let ParsedLine::Command(cmd) = parsed
                && cmd.is_move()
                && let Some(y) = cmd.get('Y')
            {
                if let Some(prev) = last_y {
                    steps.push(y - prev);
                }
                last_y = Some(y);
            }
        }
        steps
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }
}

/// Replay `gcode` and collect an [`Inspection`]
///
/// Axis values that repeat the tracked position are reported as info
/// diagnostics. A `TOOLCHANGE START` marker forgets the tracked position,
/// since every toolchange block is emitted from an unknown position.
pub fn inspect(gcode: &str) -> Inspection {
    let mut inspection = Inspection::default();
    let mut x: Option<f32> = None;
    let mut y: Option<f32> = None;
    let mut feedrate: Option<f32> = None;

    for (index, line) in gcode.lines().enumerate() {
        let line_num = index + 1;
        let parsed = parse_line(line);
        inspection
            .diagnostics
            .diagnostics
            .extend(check_line(line_num, &parsed).diagnostics);

        let (command, comment) = match &parsed {
            ParsedLine::Command(cmd) => (Some(cmd), cmd.comment.as_deref()),
            ParsedLine::Comment(text) => (None, Some(text.as_str())),
            ParsedLine::Empty => (None, None),
        };

        if let Some(text) = comment {
            if let Some(caps) = MARKER_RE.captures(text) {
                let marker = caps[1].to_string();
                if marker == "TOOLCHANGE START" {
                    x = None;
                    y = None;
                }
                inspection.markers.push(marker);
            }
            if let Some(caps) = HEADER_RE.captures(text)
                && let Ok(number) = caps[1].parse()
            {
                inspection.toolchange_numbers.push(number);
            }
        }

        let Some(cmd) = command else { continue };
        if let Some(tool) = cmd.tool() {
            inspection.tools.push(tool);
            continue;
        }
        if !cmd.is_move() {
            continue;
        }

        let new_x = cmd.get('X');
        let new_y = cmd.get('Y');
        for (letter, value, current) in [('X', new_x, x), ('Y', new_y, y)] {
            if value.is_some() && value == current {
                inspection
                    .diagnostics
                    .add_info(line_num, format!("'{}' repeats the current position", letter));
            }
        }
        if let Some(f) = cmd.get('F') {
            if Some(f) == feedrate {
                inspection
                    .diagnostics
                    .add_info(line_num, "'F' repeats the current feedrate".to_string());
            }
            feedrate = Some(f);
            inspection.max_feedrate = inspection.max_feedrate.max(f);
        }

        let e = cmd.get('E').unwrap_or(0.0);
        inspection.total_extrusion += e;
        let moved_xy = new_x.is_some() || new_y.is_some();
        x = new_x.or(x);
        y = new_y.or(y);

        if moved_xy {
            if e > 0.0 {
                inspection.extrusion_moves += 1;
            } else if e == 0.0 {
                inspection.travel_moves += 1;
            }
            if let (Some(px), Some(py)) = (x, y) {
                let p = Point::new(px, py);
                inspection.end_position = Some(p);
                inspection.bounds = Some(match inspection.bounds {
                    Some((lo, hi)) => (
                        Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                        Point::new(hi.x.max(p.x), hi.y.max(p.y)),
                    ),
                    None => (p, p),
                });
            }
        }
    }

    inspection
}
