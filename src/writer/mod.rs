//! G-code Writer
//!
//! Stateful emitter for the tower's motion dialect. The writer remembers
//! where the head is, the feedrate it last commanded and the current layer
//! Z, and only writes the fields of a move that actually change. All tower
//! code talks to the printer exclusively through one `Writer` per call.

pub mod format;

use crate::geometry::Point;
use crate::material::MaterialType;

use format::{push_axis, push_extrusion, push_feedrate};

/// Append-only G-code emitter with diff-based move output
#[derive(Debug, Clone, Default)]
pub struct Writer {
    /// Last commanded XY position, `None` until the first coordinate write
    current_pos: Option<Point>,
    current_z: f32,
    current_feedrate: f32,
    extrusion_flow: f32,
    gcode: String,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the layer Z used as the base for Z-hops (no output)
    pub fn set_z(&mut self, z: f32) -> &mut Self {
        self.current_z = z;
        self
    }

    /// Set the filament length extruded per mm of travel (no output)
    /// Declare where the head already is, without emitting a move
    pub fn set_position(&mut self, pos: Point) -> &mut Self {
        self.current_pos = Some(pos);
        self
    }

    pub fn set_extrusion_flow(&mut self, flow: f32) -> &mut Self {
        self.extrusion_flow = flow;
        self
    }

    pub fn gcode(&self) -> &str {
        &self.gcode
    }

    pub fn into_gcode(self) -> String {
        self.gcode
    }

    /// Last commanded position, if any coordinate was written yet
    pub fn pos(&self) -> Option<Point> {
        self.current_pos
    }

    /// X of the last commanded position, 0 while unknown
    pub fn x(&self) -> f32 {
        self.current_pos.map_or(0.0, |p| p.x)
    }

    /// Y of the last commanded position, 0 while unknown
    pub fn y(&self) -> f32 {
        self.current_pos.map_or(0.0, |p| p.y)
    }

    pub fn z(&self) -> f32 {
        self.current_z
    }

    pub fn current_feedrate(&self) -> f32 {
        self.current_feedrate
    }

    pub fn extrusion_flow(&self) -> f32 {
        self.extrusion_flow
    }

    /// Change the feedrate with a bare `G1 F..` when it differs
    pub fn feedrate(&mut self, f: f32) -> &mut Self {
        if f != self.current_feedrate {
            self.gcode.push_str("G1");
            self.push_feedrate_field(f);
            self.gcode.push('\n');
        }
        self
    }

    /// Linear move to `(x, y)` extruding exactly `e`
    ///
    /// Only the words that differ from the tracked state are written; a
    /// feedrate of 0 keeps the current one. A request that would change
    /// nothing emits nothing.
    pub fn extrude_explicit(&mut self, x: f32, y: f32, e: f32, f: f32) -> &mut Self {
        let target = Point::new(x, y);
        if self.current_pos == Some(target) && e == 0.0 && (f == 0.0 || f == self.current_feedrate)
        {
            return self;
        }

        self.gcode.push_str("G1");
        match self.current_pos {
            Some(current) => {
                if x != current.x {
                    push_axis(&mut self.gcode, 'X', x);
                }
                if y != current.y {
                    push_axis(&mut self.gcode, 'Y', y);
                }
            }
            None => {
                push_axis(&mut self.gcode, 'X', x);
                push_axis(&mut self.gcode, 'Y', y);
            }
        }
        if e != 0.0 {
            push_extrusion(&mut self.gcode, e);
        }
        if f != 0.0 && f != self.current_feedrate {
            self.push_feedrate_field(f);
        }
        self.gcode.push('\n');

        self.current_pos = Some(target);
        self
    }

    pub fn extrude_explicit_to(&mut self, dest: Point, e: f32, f: f32) -> &mut Self {
        self.extrude_explicit(dest.x, dest.y, e, f)
    }

    /// Move without extruding; `f` of 0 keeps the current feedrate
    pub fn travel(&mut self, x: f32, y: f32, f: f32) -> &mut Self {
        self.extrude_explicit(x, y, 0.0, f)
    }

    pub fn travel_to(&mut self, dest: Point, f: f32) -> &mut Self {
        self.extrude_explicit(dest.x, dest.y, 0.0, f)
    }

    /// Extrude along a line, the amount following the current flow
    ///
    /// With no known start position the length is undefined, so the move
    /// is written without an E word.
    pub fn extrude(&mut self, x: f32, y: f32, f: f32) -> &mut Self {
        let e = self
            .current_pos
            .map_or(0.0, |p| p.distance_to(Point::new(x, y)) * self.extrusion_flow);
        self.extrude_explicit(x, y, e, f)
    }

    pub fn extrude_to(&mut self, dest: Point, f: f32) -> &mut Self {
        self.extrude(dest.x, dest.y, f)
    }

    /// Push filament into the nozzle without moving
    pub fn deretract(&mut self, e: f32, f: f32) -> &mut Self {
        if e == 0.0 && (f == 0.0 || f == self.current_feedrate) {
            return self;
        }
        self.gcode.push_str("G1");
        if e != 0.0 {
            push_extrusion(&mut self.gcode, e);
        }
        if f != 0.0 && f != self.current_feedrate {
            self.push_feedrate_field(f);
        }
        self.gcode.push('\n');
        self
    }

    /// Pull filament out of the nozzle without moving
    pub fn retract(&mut self, e: f32, f: f32) -> &mut Self {
        self.deretract(-e, f)
    }

    /// Load filament while sliding along X at the current Y
    pub fn deretract_move_x(&mut self, x: f32, e: f32, f: f32) -> &mut Self {
        let y = self.y();
        self.extrude_explicit(x, y, e, f)
    }

    /// Lift (or lower) the nozzle to `hop` above the layer Z
    ///
    /// The tracked layer Z stays untouched; `z_hop(0.0, ..)` returns to it.
    pub fn z_hop(&mut self, hop: f32, f: f32) -> &mut Self {
        self.gcode.push_str("G1");
        push_axis(&mut self.gcode, 'Z', self.current_z + hop);
        if f != 0.0 && f != self.current_feedrate {
            self.push_feedrate_field(f);
        }
        self.gcode.push('\n');
        self
    }

    /// Step to `(x1, y + dy)`, then push `e` out quickly while moving to `x2`
    pub fn ram(&mut self, x1: f32, x2: f32, dy: f32, e: f32, f: f32) -> &mut Self {
        let y = self.y() + dy;
        self.travel(x1, y, f).extrude_explicit(x2, y, e, 0.0)
    }

    /// One cooling pulse: out by `e1` towards `x1`, back by `e2` towards `x2`
    pub fn cool(&mut self, x1: f32, x2: f32, e1: f32, e2: f32, f: f32) -> &mut Self {
        let y = self.y();
        self.extrude_explicit(x1, y, e1, f)
            .extrude_explicit(x2, y, e2, 0.0)
    }

    pub fn set_tool(&mut self, tool: u32) -> &mut Self {
        self.gcode.push_str(&format!("T{}\n", tool));
        self
    }

    /// `M104` (or `M109` when waiting) hotend target
    pub fn set_extruder_temp(&mut self, temperature: u32, wait: bool) -> &mut Self {
        let code = if wait { 109 } else { 104 };
        self.gcode
            .push_str(&format!("M{} S{}\n", code, temperature));
        self
    }

    /// `M220` speed factor override, in percent
    pub fn speed_override(&mut self, percent: u32) -> &mut Self {
        self.gcode.push_str(&format!("M220 S{}\n", percent));
        self
    }

    /// `M907` extruder motor current (digital trimpot)
    pub fn set_extruder_trimpot(&mut self, current: u32) -> &mut Self {
        self.gcode.push_str(&format!("M907 E{}\n", current));
        self
    }

    /// Zero-length dwell, drains the planner queue
    pub fn flush_planner_queue(&mut self) -> &mut Self {
        self.gcode.push_str("G4 S0\n");
        self
    }

    pub fn reset_extruder(&mut self) -> &mut Self {
        self.gcode.push_str("G92 E0.0\n");
        self
    }

    pub fn comment_with_value(&mut self, comment: &str, value: u32) -> &mut Self {
        self.gcode.push_str(&format!(";{}{}\n", comment, value));
        self
    }

    pub fn comment_material(&mut self, material: MaterialType) -> &mut Self {
        self.gcode
            .push_str(&format!("; material : {}\n", material.comment_label()));
        self
    }

    /// Append raw text as is
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.gcode.push_str(text);
        self
    }

    fn push_feedrate_field(&mut self, f: f32) {
        push_feedrate(&mut self.gcode, f);
        self.current_feedrate = f;
    }
}
