//! Wipe Tower
//!
//! The tower is a block printed next to the object that receives the purge
//! of every toolchange. Each toolchange gets its own horizontal band of the
//! tower; layers without a toolchange get a sparse "empty grid" so the
//! tower keeps growing at the same rate as the print.
//!
//! - `toolchange`: the unload / change / load / wipe / finish sequence
//! - `layout`: bands, the first layer brim and the idle layer grid

pub mod layout;
pub mod toolchange;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::material::MaterialType;

/// Process-wide tower settings, supplied once before any toolchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    /// X of the tower's front left corner
    pub x: f32,
    /// Y of the tower's front left corner
    pub y: f32,
    pub width: f32,
    /// Depth of the band reserved for a single toolchange
    pub wipe_area: f32,
    /// Number of bands the tower is built for
    pub color_changes: u32,
    pub perimeter_width: f32,
    /// Base retraction length, mm of filament
    pub retract: f32,
    pub z_hop: f32,
    /// Filament mm per mm of nominal extrusion path
    pub extrusion_flow: f32,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 60.0,
            wipe_area: 10.0,
            color_changes: 4,
            perimeter_width: 0.5,
            retract: 4.0,
            z_hop: 0.5,
            extrusion_flow: 0.029,
        }
    }
}

impl TowerConfig {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Vertical orientation of a toolchange pattern
///
/// Consecutive toolchanges alternate shapes so purge is spread evenly.
/// A reversed pattern starts at the back of its band and steps towards
/// the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipeShape {
    #[default]
    Normal,
    Reversed,
}

impl WipeShape {
    /// Sign applied to every Y increment of the pattern
    pub fn sign(&self) -> f32 {
        match self {
            WipeShape::Normal => 1.0,
            WipeShape::Reversed => -1.0,
        }
    }

    pub fn flipped(&self) -> WipeShape {
        match self {
            WipeShape::Normal => WipeShape::Reversed,
            WipeShape::Reversed => WipeShape::Normal,
        }
    }
}

/// Parameters of one toolchange event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolChange {
    /// Tool (filament slot) to switch to
    pub tool: u32,
    pub current_material: MaterialType,
    pub new_material: MaterialType,
    /// New hotend target, 0 leaves the temperature alone
    #[serde(default)]
    pub temperature: u32,
    #[serde(default)]
    pub shape: WipeShape,
    /// Running toolchange number, written to the header comment
    #[serde(default)]
    pub count: u32,
    /// Depth of the band reserved for this change
    pub space_available: f32,
    /// Start of the band, relative to the tower's front edge
    pub wipe_start_y: f32,
    /// Only unload: there is nothing left to print afterwards
    #[serde(default)]
    pub last_in_file: bool,
    /// First load of this color, primes with fewer lines
    #[serde(default)]
    pub color_init: bool,
}

/// G-code of one toolchange plus where it left the nozzle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolChangeResult {
    pub gcode: String,
    pub end_pos: Point,
    /// The wipe band was too small to fill, or could not be crossed
    pub degenerate_wipe: bool,
}

/// Wipe tower generator bound to one set of tower settings
#[derive(Debug, Clone)]
pub struct WipeTower {
    config: TowerConfig,
    z: f32,
    first_layer: bool,
}

impl WipeTower {
    pub fn new(config: TowerConfig) -> Self {
        Self {
            config,
            z: 0.0,
            first_layer: false,
        }
    }

    pub fn config(&self) -> &TowerConfig {
        &self.config
    }

    /// Switch to a new print layer
    pub fn set_layer(&mut self, z: f32, first_layer: bool) {
        log::debug!("wipe tower layer z={:.3} first_layer={}", z, first_layer);
        self.z = z;
        self.first_layer = first_layer;
    }

    pub fn z(&self) -> f32 {
        self.z
    }

    pub fn is_first_layer(&self) -> bool {
        self.first_layer
    }

    fn perimeter_width(&self) -> f32 {
        self.config.perimeter_width
    }
}
