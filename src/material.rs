//! Filament Materials
//!
//! Material classes known to the tower and the empirically tuned motion
//! tables used to unload and reload them. The numbers in the tables are
//! physical process parameters (ramming volumes, cooling pulse lengths,
//! feedrates), not style: changing them changes how the filament tip
//! is shaped before it is pulled out of the melt zone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Filament material class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialType {
    Pla,
    Abs,
    Pet,
    Hips,
    Flex,
    Scaff,
    Edge,
    Ngen,
    Pva,
    /// Returned by [`parse_material`] for unknown names
    Invalid,
}

const NAMED_MATERIALS: [(&str, MaterialType); 9] = [
    ("PLA", MaterialType::Pla),
    ("ABS", MaterialType::Abs),
    ("PET", MaterialType::Pet),
    ("HIPS", MaterialType::Hips),
    ("FLEX", MaterialType::Flex),
    ("SCAFF", MaterialType::Scaff),
    ("EDGE", MaterialType::Edge),
    ("NGEN", MaterialType::Ngen),
    ("PVA", MaterialType::Pva),
];

/// Map a material name (case-insensitive) to its class
///
/// Unknown names map to [`MaterialType::Invalid`]; callers decide whether
/// that is an error.
pub fn parse_material(name: &str) -> MaterialType {
    NAMED_MATERIALS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, material)| *material)
        .unwrap_or(MaterialType::Invalid)
}

impl MaterialType {
    pub fn name(&self) -> &'static str {
        NAMED_MATERIALS
            .iter()
            .find(|(_, material)| material == self)
            .map(|(name, _)| *name)
            .unwrap_or("INVALID")
    }

    pub fn is_valid(&self) -> bool {
        *self != MaterialType::Invalid
    }

    /// Label used in the `; material :` comment of a toolchange header
    pub fn comment_label(&self) -> &'static str {
        match self {
            MaterialType::Pva => "#8 (PVA)",
            MaterialType::Scaff => "#5 (Scaffold)",
            MaterialType::Flex => "#4 (Flex)",
            _ => "DEFAULT (PLA)",
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MaterialType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_material(s))
    }
}

impl<'de> Deserialize<'de> for MaterialType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(parse_material(&name))
    }
}

impl Serialize for MaterialType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Side of the cleaning box an X coordinate is measured from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Edge {
    /// `inset` perimeter widths right of the left ramming limit
    Left(f32),
    /// `inset` perimeter widths left of the right ramming limit
    Right(f32),
}

impl Edge {
    pub fn resolve(&self, xl: f32, xr: f32, perimeter_width: f32) -> f32 {
        match *self {
            Edge::Left(inset) => xl + perimeter_width * inset,
            Edge::Right(inset) => xr - perimeter_width * inset,
        }
    }
}

/// One ramming stroke of the unload phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RamSegment {
    pub start: Edge,
    pub end: Edge,
    /// Y step before the stroke, in units of the shape-signed perimeter width
    pub dy: f32,
    /// Filament pushed out during the stroke
    pub e: f32,
    pub feedrate: f32,
}

/// Push out / pull back pair shaping the filament tip while it cools
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoolingPulse {
    pub e_out: f32,
    pub e_in: f32,
    pub feedrate: f32,
}

/// Motion parameters for one material class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    pub ramming: &'static [RamSegment],
    pub cooling: &'static [CoolingPulse],
    /// `M220` percentage applied after switching to this material
    pub speed_override: u32,
}

const fn ram(start: Edge, end: Edge, dy: f32, e: f32, feedrate: f32) -> RamSegment {
    RamSegment {
        start,
        end,
        dy,
        e,
        feedrate,
    }
}

const fn pulse(e_out: f32, e_in: f32, feedrate: f32) -> CoolingPulse {
    CoolingPulse {
        e_out,
        e_in,
        feedrate,
    }
}

use Edge::{Left, Right};

static PVA_RAMMING: [RamSegment; 4] = [
    ram(Left(2.0), Right(1.0), 1.2, 3.0, 4000.0),
    ram(Right(1.0), Left(1.0), 1.5, 3.0, 4500.0),
    ram(Left(2.0), Right(2.0), 1.5, 3.0, 4800.0),
    ram(Right(1.0), Left(1.0), 1.5, 3.0, 5000.0),
];

static PVA_COOLING: [CoolingPulse; 6] = [
    pulse(3.0, -5.0, 1600.0),
    pulse(5.0, -5.0, 2000.0),
    pulse(5.0, -5.0, 2200.0),
    pulse(5.0, -5.0, 2400.0),
    pulse(5.0, -5.0, 2400.0),
    pulse(5.0, -5.0, 2400.0),
];

static SCAFF_RAMMING: [RamSegment; 3] = [
    ram(Left(2.0), Right(1.0), 3.0, 3.0, 4000.0),
    ram(Right(1.0), Left(1.0), 3.0, 4.0, 4600.0),
    ram(Left(2.0), Right(2.0), 3.0, 4.5, 5200.0),
];

static SCAFF_COOLING: [CoolingPulse; 5] = [
    pulse(3.0, -5.0, 1600.0),
    pulse(5.0, -5.0, 2000.0),
    pulse(5.0, -5.0, 2200.0),
    pulse(5.0, -5.0, 2200.0),
    pulse(5.0, -5.0, 2400.0),
];

static DEFAULT_RAMMING: [RamSegment; 3] = [
    ram(Left(2.0), Right(1.0), 1.2, 1.6, 4000.0),
    ram(Right(1.0), Left(1.0), 1.2, 1.65, 4600.0),
    ram(Left(2.0), Right(2.0), 1.2, 1.74, 5200.0),
];

static DEFAULT_COOLING: [CoolingPulse; 4] = [
    pulse(3.0, -5.0, 1600.0),
    pulse(5.0, -5.0, 2000.0),
    pulse(5.0, -5.0, 2400.0),
    pulse(5.0, -3.0, 2400.0),
];

pub static PVA_PROFILE: MotionProfile = MotionProfile {
    ramming: &PVA_RAMMING,
    cooling: &PVA_COOLING,
    speed_override: 80,
};

pub static SCAFF_PROFILE: MotionProfile = MotionProfile {
    ramming: &SCAFF_RAMMING,
    cooling: &SCAFF_COOLING,
    speed_override: 35,
};

// Flex unloads like the default class but prints slowly.
pub static FLEX_PROFILE: MotionProfile = MotionProfile {
    ramming: &DEFAULT_RAMMING,
    cooling: &DEFAULT_COOLING,
    speed_override: 35,
};

pub static DEFAULT_PROFILE: MotionProfile = MotionProfile {
    ramming: &DEFAULT_RAMMING,
    cooling: &DEFAULT_COOLING,
    speed_override: 100,
};

impl MotionProfile {
    pub fn for_material(material: MaterialType) -> &'static MotionProfile {
        match material {
            MaterialType::Pva => &PVA_PROFILE,
            MaterialType::Scaff => &SCAFF_PROFILE,
            MaterialType::Flex => &FLEX_PROFILE,
            _ => &DEFAULT_PROFILE,
        }
    }
}
