//! Field formatting for emitted G-code
//!
//! Fixed precision per field letter: 3 decimals for axes, 4 for the
//! extruder, none for feedrates and integer parameters. Rust's float
//! formatting never depends on the locale, so the decimal point is always
//! a `.` and no grouping is applied.

use std::fmt::Write;

/// Decimal places used for X, Y and Z words
pub const AXIS_PRECISION: usize = 3;
/// Decimal places used for E words
pub const EXTRUSION_PRECISION: usize = 4;

/// Append ` <letter><value>` with `precision` decimals to `out`
pub fn push_field(out: &mut String, letter: char, value: f32, precision: usize) {
    // Writing into a String cannot fail.
    let _ = write!(out, " {}{:.*}", letter, precision, value);
}

pub fn push_axis(out: &mut String, letter: char, value: f32) {
    push_field(out, letter, value, AXIS_PRECISION);
}

pub fn push_extrusion(out: &mut String, e: f32) {
    push_field(out, 'E', e, EXTRUSION_PRECISION);
}

pub fn push_feedrate(out: &mut String, f: f32) {
    push_field(out, 'F', f, 0);
}
