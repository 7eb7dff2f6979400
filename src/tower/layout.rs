//! Tower Layout
//!
//! Where things go inside the tower: the band reserved for each
//! toolchange, the brim printed under the tower on the first layer, and
//! the sparse grid that keeps the tower growing on layers without a
//! toolchange.

use rand::Rng;

use crate::geometry::{BoxCoordinates, Point};
use crate::writer::Writer;

use super::WipeTower;

impl WipeTower {
    /// Perimeter-width strip at the front of the `order`-th band
    ///
    /// Bands overlap their neighbours by half a perimeter width, hence the
    /// shift towards the front.
    pub fn box_for_color(&self, order: u32) -> BoxCoordinates {
        let pw = self.perimeter_width();
        BoxCoordinates::new(
            self.config.x,
            self.config.y + self.config.wipe_area * order as f32 - pw / 2.0,
            self.config.width,
            pw,
        )
    }

    /// Whole band reserved for the `index`-th toolchange
    pub fn reserved_band(&self, index: u32) -> BoxCoordinates {
        let mut band = self.box_for_color(index);
        band.lu.y = band.ld.y + self.config.wipe_area;
        band.ru.y = band.lu.y;
        band
    }

    /// Outline of the full tower, all bands stacked
    pub fn tower_box(&self) -> BoxCoordinates {
        BoxCoordinates::from_pos(
            self.config.position(),
            self.config.width,
            self.config.wipe_area * self.config.color_changes as f32
                - self.perimeter_width() / 2.0,
        )
    }

    /// Brim under the tower, printed once on the first layer
    ///
    /// `side_only` draws four short strokes along the left and right edges
    /// (inset by `y_offset` at both ends) instead of four full loops.
    pub fn first_layer_brim(&self, side_only: bool, y_offset: f32) -> String {
        let pw = self.perimeter_width();
        let tower_box = self.tower_box();
        let prime_offset = Point::new(pw * 10.0, 0.0);

        let mut writer = Writer::new();
        writer
            .set_extrusion_flow(self.config.extrusion_flow * 1.1)
            .set_z(self.z)
            .append(";-------------------------------------\n; CP WIPE TOWER FIRST LAYER BRIM START\n");

        // Prime along a line left of the tower before touching it.
        writer
            .z_hop(self.config.z_hop, 7200.0)
            .travel_to(tower_box.lu - prime_offset, 6000.0)
            .z_hop(0.0, 7200.0)
            .extrude_explicit_to(tower_box.ld - prime_offset, self.config.retract, 2400.0)
            .feedrate(2100.0);

        if side_only {
            let mut x_offset = 0.0;
            for _ in 0..4 {
                writer
                    .travel_to(tower_box.ld + Point::new(-x_offset, y_offset), 0.0)
                    .extrude_to(tower_box.lu + Point::new(-x_offset, -y_offset), 0.0);
                x_offset += pw;
            }
            writer
                .travel_to(tower_box.rd + Point::new(x_offset, y_offset), 7000.0)
                .feedrate(2100.0);
            x_offset = 0.0;
            for _ in 0..4 {
                writer
                    .travel_to(tower_box.rd + Point::new(x_offset, y_offset), 0.0)
                    .extrude_to(tower_box.ru + Point::new(x_offset, -y_offset), 0.0);
                x_offset += pw;
            }
        } else {
            let mut b = tower_box;
            b.ld += Point::new(-pw / 2.0, 0.0);
            b.lu += Point::new(-pw / 2.0, pw);
            b.rd += Point::new(pw / 2.0, 0.0);
            b.ru += Point::new(pw / 2.0, pw);
            for _ in 0..4 {
                writer
                    .travel_to(b.ld, 0.0)
                    .extrude_to(b.lu, 0.0)
                    .extrude_to(b.ru, 0.0)
                    .extrude_to(b.rd, 0.0)
                    .extrude_to(b.ld, 0.0);
                b.expand(pw);
            }
        }

        // Wipe along the front edge.
        writer
            .travel_to(tower_box.ld, 7000.0)
            .travel_to(tower_box.rd, 0.0)
            .travel_to(tower_box.ld, 0.0)
            .append("; CP WIPE TOWER FIRST LAYER BRIM END\n;-----------------------------------\n");

        writer.into_gcode()
    }

    /// Corner the idle fill of band `order` starts printing from
    pub fn idle_fill_start(&self, order: u32, first_layer_offset: f32) -> Point {
        self.box_for_color(order).ld + Point::new(0.0, first_layer_offset)
    }

    /// Sparse grid for a tower layer without a toolchange
    ///
    /// Covers the bands from `order` up to `total`. Unless it directly
    /// follows a toolchange, the nozzle retracts, hops and lands at a
    /// random 5 to 20 mm right of the start corner so seams don't stack
    /// up layer after layer. Directly after a toolchange the nozzle is
    /// expected at [`WipeTower::idle_fill_start`].
    pub fn idle_layer_fill<R: Rng + ?Sized>(
        &self,
        order: u32,
        total: u32,
        layer: u32,
        after_toolchange: bool,
        first_layer_offset: f32,
        rng: &mut R,
    ) -> String {
        let pw = self.perimeter_width();
        let retract = self.config.retract * 1.5;
        let speed_factor = if self.first_layer { 0.5 } else { 1.0 };

        let mut writer = Writer::new();
        writer
            .set_extrusion_flow(self.config.extrusion_flow)
            .set_z(self.z)
            .append(";--------------------\n; CP EMPTY GRID START\n")
            .comment_with_value(" layer #", layer);

        let mut p = self.box_for_color(order);
        let top = self.box_for_color(total);
        p.ld.y += first_layer_offset;
        p.rd.y += first_layer_offset;
        p.lu = top.lu;
        p.ru = top.ru;

        if after_toolchange {
            writer.set_position(p.ld);
        } else {
            let jitter: i32 = rng.gen_range(5..=20);
            writer
                .retract(retract, 3600.0)
                .z_hop(self.config.z_hop, 7200.0)
                .travel(p.ld.x + jitter as f32, p.ld.y, 7000.0)
                .z_hop(0.0, 7200.0)
                .extrude_explicit_to(p.ld, retract, 3600.0);
        }

        let mut b = p;
        writer
            .extrude_to(b.lu, 2400.0 * speed_factor)
            .extrude_to(b.ru, 0.0)
            .extrude_to(b.rd, 0.0)
            .extrude_to(b.ld + Point::new(pw / 2.0, 0.0), 0.0);

        b.expand(-pw / 2.0);
        writer
            .extrude_to(b.lu, 3200.0 * speed_factor)
            .extrude_to(b.ru, 0.0)
            .extrude_to(b.rd, 0.0)
            .extrude_to(b.ld + Point::new(pw / 2.0, 0.0), 0.0)
            .extrude_to(b.ld + Point::new(pw / 2.0, pw / 2.0), 0.0);

        // Connectors on the left.
        writer
            .extrude_to(p.ld + Point::new(pw * 3.0, pw), 2900.0 * speed_factor)
            .extrude_to(p.lu + Point::new(pw * 3.0, -pw), 0.0)
            .extrude_to(p.lu + Point::new(pw * 6.0, -pw), 0.0)
            .extrude_to(p.ld + Point::new(pw * 6.0, pw), 0.0);

        if p.height() > 4.0 {
            writer.feedrate(3200.0 * speed_factor);
            let step = (self.config.width - pw * 12.0) / 12.0;
            let low = p.ld.y + pw * 8.0;
            let high = p.lu.y - pw * 8.0;
            for _ in 0..3 {
                let x = writer.x();
                writer
                    .extrude(x + step, low, 0.0)
                    .extrude(x + step, high, 0.0)
                    .extrude(x + 2.0 * step, p.lu.y - pw, 0.0)
                    .extrude(x + 3.0 * step, high, 0.0)
                    .extrude(x + 3.0 * step, low, 0.0)
                    .extrude(x + 4.0 * step, p.ld.y + pw, 0.0);
            }
        }

        // Connectors on the right, then wipe along the front.
        writer
            .extrude_to(p.ru + Point::new(-pw * 6.0, -pw), 2900.0 * speed_factor)
            .extrude_to(p.ru + Point::new(-pw * 3.0, -pw), 0.0)
            .extrude_to(p.rd + Point::new(-pw * 3.0, pw), 0.0)
            .extrude_to(p.rd + Point::new(-pw, pw), 0.0)
            .travel_to(p.ld + Point::new(pw, pw / 2.0), 7200.0)
            .travel_to(p.rd + Point::new(-pw, pw / 2.0), 0.0)
            .append("; CP EMPTY GRID END\n;------------------\n\n\n\n\n\n\n");

        writer.into_gcode()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::tower::TowerConfig;

    fn tower(perimeter_width: f32) -> WipeTower {
        let mut tower = WipeTower::new(TowerConfig {
            x: 0.0,
            y: 0.0,
            width: 60.0,
            wipe_area: 10.0,
            color_changes: 4,
            perimeter_width,
            ..TowerConfig::default()
        });
        tower.set_layer(0.6, false);
        tower
    }

    fn extrusion_lines(gcode: &str) -> usize {
        gcode
            .lines()
            .filter(|l| l.starts_with("G1 X") || l.starts_with("G1 Y"))
            .filter(|l| l.contains(" E"))
            .count()
    }

    #[test]
    fn band_for_first_color() {
        let tower = tower(0.4);
        let band = tower.reserved_band(0);
        assert_eq!(band.ld, Point::new(0.0, -0.2));
        assert_eq!(band.rd.x, 60.0);
        assert!((band.lu.y - 9.8).abs() < 1e-4);
        assert_eq!(band.lu.y, band.ru.y);

        let strip = tower.box_for_color(0);
        assert_eq!(strip.ld, band.ld);
        assert_eq!(strip.rd, band.rd);
        assert!((strip.lu.y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn bands_step_by_wipe_area() {
        let tower = tower(0.4);
        let third = tower.reserved_band(2);
        assert!((third.ld.y - 19.8).abs() < 1e-4);
        assert!((third.lu.y - 29.8).abs() < 1e-4);
    }

    #[test]
    fn full_brim_draws_four_loops() {
        let gcode = tower(0.5).first_layer_brim(false, 0.0);
        assert!(gcode.contains("; CP WIPE TOWER FIRST LAYER BRIM START\n"));
        assert!(gcode.ends_with(";-----------------------------------\n"));
        // One priming line plus four loops of four sides.
        assert_eq!(extrusion_lines(&gcode), 1 + 16);
        assert!(gcode.contains("G1 Z1.100 F7200\n"));
        // Prime starts 10 perimeters left of the tower's back edge.
        assert!(gcode.contains("G1 X-5.000 Y39.750 F6000\n"));
    }

    #[test]
    fn side_brim_draws_eight_strokes() {
        let gcode = tower(0.5).first_layer_brim(true, 1.0);
        assert_eq!(extrusion_lines(&gcode), 1 + 8);
        // Outermost right stroke sits three perimeters outside the edge.
        assert!(gcode.contains("G1 X61.500 Y1.000\n"));
    }

    #[test]
    fn idle_fill_is_reproducible_for_a_seed() {
        let tower = tower(0.5);
        let a = tower.idle_layer_fill(1, 3, 7, false, 0.0, &mut StdRng::seed_from_u64(42));
        let b = tower.idle_layer_fill(1, 3, 7, false, 0.0, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert!(a.contains("; layer #7\n"));
        assert!(a.contains("; CP EMPTY GRID END\n"));
    }

    #[test]
    fn idle_fill_jumps_with_random_offset() {
        let tower = tower(0.5);
        let start = tower.box_for_color(1).ld;
        for seed in 0..20 {
            let gcode = tower.idle_layer_fill(1, 3, 2, false, 0.0, &mut StdRng::seed_from_u64(seed));
            let lines: Vec<&str> = gcode.lines().collect();
            assert_eq!(lines[3], "G1 E-6.0000 F3600");
            let jump = lines[5];
            assert!(jump.starts_with("G1 X") && jump.ends_with(" F7000"), "{}", jump);
            let x: f32 = jump[4..]
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok())
                .expect("x value");
            assert!(x >= start.x + 5.0 && x <= start.x + 20.0, "{}", x);
        }
    }

    #[test]
    fn idle_fill_after_toolchange_skips_the_jump() {
        let tower = tower(0.5);
        let gcode = tower.idle_layer_fill(0, 3, 2, true, 0.0, &mut StdRng::seed_from_u64(1));
        assert!(!gcode.contains("E-6.0000"));
        assert!(!gcode.contains(" F7000"));
    }

    #[test]
    fn outer_rectangle_is_closed() {
        let tower = tower(0.5);
        for after_toolchange in [true, false] {
            let gcode =
                tower.idle_layer_fill(1, 3, 2, after_toolchange, 0.0, &mut StdRng::seed_from_u64(1));
            let lines: Vec<&str> = gcode.lines().collect();
            let first = lines
                .iter()
                .position(|l| l.ends_with(" F2400"))
                .expect("outer rectangle");
            assert!(lines[first].starts_with("G1 Y30.250 E"), "{}", lines[first]);
            for side in &lines[first..first + 4] {
                assert!(side.contains(" E"), "{}", side);
            }
        }
    }

    #[test]
    fn fill_starts_at_band_corner_after_toolchange() {
        let tower = tower(0.5);
        let start = tower.idle_fill_start(1, 0.3);
        assert_eq!(start, tower.box_for_color(1).ld + Point::new(0.0, 0.3));

        let gcode = tower.idle_layer_fill(1, 3, 2, true, 0.3, &mut StdRng::seed_from_u64(1));
        // No travel before the first wall
        assert!(gcode.lines().nth(3).is_some_and(|l| l.contains(" E")));
    }

    #[test]
    fn zig_zags_only_in_tall_grids() {
        let tower = tower(0.5);
        let mut rng = StdRng::seed_from_u64(3);
        let tall = tower.idle_layer_fill(0, 3, 1, true, 0.0, &mut rng);
        let flat = tower.idle_layer_fill(2, 2, 1, true, 0.0, &mut rng);
        assert!(tall.contains("\nG1 F3200\n"));
        assert!(!flat.contains("\nG1 F3200\n"));
        assert!(extrusion_lines(&tall) >= extrusion_lines(&flat) + 18);
    }

    #[test]
    fn first_layer_grid_runs_at_half_speed() {
        let mut tower = tower(0.5);
        tower.set_layer(0.2, true);
        let gcode = tower.idle_layer_fill(0, 3, 0, true, 0.0, &mut StdRng::seed_from_u64(0));
        assert!(gcode.contains(" F1200\n"));
        assert!(gcode.contains("\nG1 F1600\n"));
        assert!(!gcode.contains(" F2400\n"));
    }
}
