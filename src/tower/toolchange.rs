//! Toolchange Sequence
//!
//! One toolchange runs five phases inside its cleaning box:
//!
//! 1. unload: ram the molten tip out, pull the filament into the cooling
//!    tubes and shape the tip with cooling pulses
//! 2. change: select the new tool and its speed override
//! 3. load: feed the new filament while sliding, then prime a few lines
//! 4. wipe: zig-zag until the band is full
//! 5. finish: trace the box perimeter and wipe the nozzle
//!
//! The last toolchange of a print only unloads.

use crate::geometry::{BoxCoordinates, Point};
use crate::material::{MaterialType, MotionProfile};
use crate::writer::Writer;

use super::{ToolChange, ToolChangeResult, WipeShape, WipeTower};

/// Wipe speed before the first pass
const WIPE_START_SPEED: f32 = 4200.0;
/// Wipe speed ceiling
const WIPE_MAX_SPEED: f32 = 4800.0;
const WIPE_SPEED_STEP: f32 = 50.0;
/// Passes allowed for a single band, far more than any real tower needs
const MAX_WIPE_PASSES: usize = 2000;

/// Motor current while ramming and loading
const RAMMING_CURRENT: u32 = 750;
/// Motor current for normal printing
const NORMAL_CURRENT: u32 = 550;

/// Filament pulls that park the tip in the cooling tubes: (length, feedrate)
const COOLING_TUBE_PULLS: [(f32, f32); 3] = [(15.0, 5000.0), (50.0, 5400.0), (15.0, 3000.0)];
/// Push back after the pulls: (length, feedrate)
const COOLING_TUBE_PUSH: (f32, f32) = (12.0, 2000.0);

/// Loading strokes: (towards the right side, length, feedrate)
const LOAD_STROKES: [(bool, f32, f32); 4] = [
    (true, 20.0, 1400.0),
    (false, 40.0, 3000.0),
    (true, 20.0, 1600.0),
    (false, 10.0, 1000.0),
];

impl WipeTower {
    /// Generate the G-code for one toolchange
    ///
    /// Returns the text and the nozzle position it ends at, which is where
    /// the next toolchange (or the object) picks up.
    pub fn tool_change(&self, change: &ToolChange) -> ToolChangeResult {
        let pw = self.perimeter_width();
        let cleaning_box = BoxCoordinates::new(
            self.config.x,
            self.config.y + change.wipe_start_y,
            self.config.width,
            change.space_available - pw / 2.0,
        );
        log::debug!(
            "toolchange #{}: T{} {} -> {} shape={:?} last_in_file={}",
            change.count,
            change.tool,
            change.current_material,
            change.new_material,
            change.shape,
            change.last_in_file
        );

        let mut writer = Writer::new();
        self.toolchange_prelude(&mut writer, &cleaning_box, change);

        self.toolchange_unload(
            &mut writer,
            &cleaning_box,
            change.current_material,
            change.shape,
            change.temperature,
        );

        let mut degenerate_wipe = false;
        if !change.last_in_file {
            self.toolchange_change(&mut writer, change.tool, change.new_material);
            self.toolchange_load(&mut writer, &cleaning_box, change.shape, change.color_init);
            degenerate_wipe = self.toolchange_wipe(&mut writer, &cleaning_box, change.shape);
            self.toolchange_finish(&mut writer, &cleaning_box, change.shape);
        }

        writer
            .set_extruder_trimpot(NORMAL_CURRENT)
            .flush_planner_queue()
            .reset_extruder()
            .append("; CP TOOLCHANGE END\n;------------------\n\n\n");

        let end_pos = writer.pos().unwrap_or_default();
        ToolChangeResult {
            gcode: writer.into_gcode(),
            end_pos,
            degenerate_wipe,
        }
    }

    /// Header, hop over to the band and get ready for ramming
    fn toolchange_prelude(
        &self,
        writer: &mut Writer,
        cleaning_box: &BoxCoordinates,
        change: &ToolChange,
    ) {
        let pw = self.perimeter_width();
        let retract = self.config.retract;
        let corner = match change.shape {
            WipeShape::Normal => cleaning_box.ld,
            WipeShape::Reversed => cleaning_box.lu,
        };
        let entry = corner + Point::new(pw, change.shape.sign() * pw);

        writer
            .set_extrusion_flow(self.config.extrusion_flow)
            .set_z(self.z)
            .append(";--------------------\n; CP TOOLCHANGE START\n")
            .comment_with_value(" toolchange #", change.count)
            .comment_material(change.current_material)
            .append(";--------------------\n")
            .speed_override(100)
            .z_hop(self.config.z_hop, 7200.0)
            .retract(retract / 2.0, 3600.0)
            .travel_to(entry, 7200.0)
            .z_hop(0.0, 7200.0)
            .deretract(retract / 2.0, 3600.0)
            .deretract(retract, 1500.0)
            .set_extruder_trimpot(RAMMING_CURRENT)
            .flush_planner_queue();
    }

    /// Ram the molten material out and park the filament tip
    pub(crate) fn toolchange_unload(
        &self,
        writer: &mut Writer,
        cleaning_box: &BoxCoordinates,
        material: MaterialType,
        shape: WipeShape,
        temperature: u32,
    ) {
        let pw = self.perimeter_width();
        let xl = cleaning_box.ld.x + pw / 2.0;
        let xr = cleaning_box.rd.x - pw / 2.0;
        let y_step = shape.sign() * pw;
        let profile = MotionProfile::for_material(material);

        writer.append("; CP TOOLCHANGE UNLOAD\n");

        for segment in profile.ramming {
            writer.ram(
                segment.start.resolve(xl, xr, pw),
                segment.end.resolve(xl, xr, pw),
                y_step * segment.dy,
                segment.e,
                segment.feedrate,
            );
        }

        for (length, feedrate) in COOLING_TUBE_PULLS {
            writer.retract(length, feedrate);
        }
        writer.deretract(COOLING_TUBE_PUSH.0, COOLING_TUBE_PUSH.1);

        if temperature != 0 {
            writer.set_extruder_temp(temperature, false);
        }

        let (x, y) = (writer.x(), writer.y());
        writer.travel(x, y + y_step * 0.8, 1600.0);
        for pulse in profile.cooling {
            writer.cool(xl, xr, pulse.e_out, pulse.e_in, pulse.feedrate);
        }

        writer.flush_planner_queue();
    }

    /// Select the new tool, slow down for flexible and soluble materials
    pub(crate) fn toolchange_change(
        &self,
        writer: &mut Writer,
        tool: u32,
        new_material: MaterialType,
    ) {
        let speed_override = MotionProfile::for_material(new_material).speed_override;
        writer
            .append("; CP TOOLCHANGE CHANGE\n")
            .set_tool(tool)
            .speed_override(speed_override)
            .flush_planner_queue();
    }

    /// Feed the new filament in and prime three or five lines
    pub(crate) fn toolchange_load(
        &self,
        writer: &mut Writer,
        cleaning_box: &BoxCoordinates,
        shape: WipeShape,
        color_init: bool,
    ) {
        let pw = self.perimeter_width();
        let xl = cleaning_box.ld.x + pw;
        let xr = cleaning_box.rd.x - pw;
        let line_step = shape.sign() * pw * 0.85;

        writer.append("; CP TOOLCHANGE LOAD\n");
        // Slide while loading so the excess does not pile up in one blob.
        for (to_right, e, feedrate) in LOAD_STROKES {
            writer.deretract_move_x(if to_right { xr } else { xl }, e, feedrate);
        }

        let y = writer.y();
        writer.extrude(xr, y, 1600.0);
        let passes = if color_init { 1 } else { 2 };
        for _ in 0..passes {
            let y = writer.y() + line_step;
            writer.travel(xr, y, 2200.0).extrude(xl, y, 0.0);
            let y = y + line_step;
            writer.travel(xl, y, 0.0).extrude(xr, y, 0.0);
        }

        writer.set_extruder_trimpot(NORMAL_CURRENT);
    }

    /// Zig-zag over the rest of the band
    ///
    /// Each pass adds two lines and speeds up until the ceiling is hit.
    /// The loop stops once the nozzle has crossed to within one perimeter
    /// width of the far edge; the last pass is not clamped and may overshoot
    /// that line slightly.
    ///
    /// Returns true when the band was degenerate: narrower than a perimeter,
    /// impossible to cross, or not filled before the pass limit.
    pub(crate) fn toolchange_wipe(
        &self,
        writer: &mut Writer,
        cleaning_box: &BoxCoordinates,
        shape: WipeShape,
    ) -> bool {
        let pw = self.perimeter_width();
        let flow = self.config.extrusion_flow;
        let first_layer = self.first_layer;

        writer
            .set_extrusion_flow(if first_layer { flow * 1.18 } else { flow })
            .append("; CP TOOLCHANGE WIPE\n");

        let speed_coeff = if first_layer { 0.5 } else { 1.0 };
        let xl = cleaning_box.ld.x + 2.0 * pw;
        let xr = cleaning_box.rd.x - 2.0 * pw;
        let dy = shape.sign() * pw * 0.7;

        let far_edge = match shape {
            WipeShape::Normal => cleaning_box.lu.y - pw,
            WipeShape::Reversed => cleaning_box.ld.y + pw,
        };
        let past_far_edge = |y: f32| match shape {
            WipeShape::Normal => y > far_edge,
            WipeShape::Reversed => y < far_edge,
        };

        let too_narrow = cleaning_box.height() < pw;
        if too_narrow {
            log::warn!(
                "wipe band {:.3} mm is narrower than one perimeter ({:.3} mm), wipe pattern degenerates",
                cleaning_box.height(),
                pw
            );
        }
        let limit = wipe_pass_limit(writer.y(), far_edge, dy);

        let mut wipe_speed = WIPE_START_SPEED;
        let mut next_speed = || {
            wipe_speed = (wipe_speed + WIPE_SPEED_STEP).min(WIPE_MAX_SPEED);
            wipe_speed * speed_coeff
        };

        let mut reached_edge = false;
        for pass in 0..limit.passes {
            writer.feedrate(next_speed());
            let y = writer.y() + dy;
            if pass % 2 == 0 {
                writer
                    .extrude(xl - pw / 2.0, y, 0.0)
                    .extrude(xr + pw, y, 0.0);
            } else {
                writer
                    .extrude(xl - pw, y, 0.0)
                    .extrude(xr + pw * 2.0, y, 0.0);
            }
            writer.feedrate(next_speed());
            let y = writer.y() + dy;
            writer.extrude(xr + pw, y, 0.0).extrude(xl - pw, y, 0.0);

            if past_far_edge(writer.y()) {
                reached_edge = true;
                break;
            }
        }
        if !reached_edge {
            log::warn!(
                "wipe stopped after {} passes without reaching the far edge of its band",
                limit.passes
            );
        }

        writer.set_extrusion_flow(flow);
        too_narrow || limit.capped || !reached_edge
    }

    /// Trace the cleaning box and wipe the nozzle along its far edge
    pub(crate) fn toolchange_finish(
        &self,
        writer: &mut Writer,
        cleaning_box: &BoxCoordinates,
        shape: WipeShape,
    ) {
        let mut b = *cleaning_box;
        if shape == WipeShape::Reversed {
            b.swap_vertical();
        }

        writer
            .append("; CP TOOLCHANGE FINISH\n")
            .travel_to(b.lu, 7000.0)
            .extrude_to(b.ld, 3200.0)
            .extrude_to(b.rd, 0.0)
            .extrude_to(b.ru, 0.0)
            .extrude_to(b.lu, 0.0)
            .travel_to(b.ru, 7200.0)
            .travel_to(b.lu, 0.0)
            .feedrate(6000.0);
    }
}

/// Number of wipe passes for one band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PassLimit {
    passes: usize,
    /// The band could not be crossed within the limit
    capped: bool,
}

/// Upper bound on wipe passes needed to get from `y` past `far_edge`
///
/// A pass advances `2 * dy`. Returns at least one pass; a zero or
/// non-finite step gets a single pass since the band can never be
/// crossed, and bands deeper than [`MAX_WIPE_PASSES`] are cut short.
fn wipe_pass_limit(y: f32, far_edge: f32, dy: f32) -> PassLimit {
    let advance = 2.0 * dy.abs();
    let distance = (far_edge - y).abs();
    if advance <= 0.0 || !advance.is_finite() || !distance.is_finite() {
        log::warn!("wipe step {:.4} cannot cross the band, emitting a single pass", dy);
        return PassLimit {
            passes: 1,
            capped: true,
        };
    }
    let needed = (distance / advance).ceil();
    if needed >= MAX_WIPE_PASSES as f32 {
        log::warn!(
            "wipe band of {:.1} mm needs {} passes, limited to {}",
            distance,
            needed,
            MAX_WIPE_PASSES
        );
        return PassLimit {
            passes: MAX_WIPE_PASSES,
            capped: true,
        };
    }
    PassLimit {
        passes: (needed as usize).saturating_add(2),
        capped: false,
    }
}
