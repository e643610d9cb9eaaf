use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Unique identifier for a scene node or any other entity handed to systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic entity id allocator. Ids start at 1; 0 is never handed out.
#[derive(Debug, Clone, Default)]
pub struct EntityIds {
    last: u64,
}

impl EntityIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> EntityId {
        self.last += 1;
        EntityId(self.last)
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.last
    }
}

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Color premultiplied by an intensity, as uploaded to light uniforms.
    pub fn scaled(self, intensity: f32) -> Vec3 {
        Vec3::new(self.r, self.g, self.b) * intensity
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<Vec3> for Color {
    fn from(v: Vec3) -> Self {
        Self::rgb(v.x, v.y, v.z)
    }
}

impl From<Color> for Vec3 {
    fn from(c: Color) -> Self {
        Vec3::new(c.r, c.g, c.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown light kind {0:?}")]
    UnknownLightKind(String),
}

/// The four light kinds a scene can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub const ALL: [LightKind; 4] = [
        LightKind::Ambient,
        LightKind::Directional,
        LightKind::Point,
        LightKind::Spot,
    ];

    /// Uniform array name the shaders declare for this kind.
    pub fn uniform_name(self) -> &'static str {
        match self {
            LightKind::Ambient => "AmbientLightColor",
            LightKind::Directional => "DirLight",
            LightKind::Point => "PointLight",
            LightKind::Spot => "SpotLight",
        }
    }

    /// Number of `vec3` array elements one light of this kind occupies.
    pub fn uniform_stride(self) -> usize {
        match self {
            LightKind::Ambient => 1,
            LightKind::Directional => 2,
            LightKind::Point => 3,
            LightKind::Spot => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LightKind::Ambient => "ambient",
            LightKind::Directional => "directional",
            LightKind::Point => "point",
            LightKind::Spot => "spot",
        }
    }
}

impl FromStr for LightKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ambient" => Ok(LightKind::Ambient),
            "directional" => Ok(LightKind::Directional),
            "point" => Ok(LightKind::Point),
            "spot" => Ok(LightKind::Spot),
            _ => Err(ParseError::UnknownLightKind(s.to_string())),
        }
    }
}

/// Number of lights per kind, used to size shader uniform arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightCounts {
    pub ambient: u32,
    pub directional: u32,
    pub point: u32,
    pub spot: u32,
}

impl LightCounts {
    pub fn get(&self, kind: LightKind) -> u32 {
        match kind {
            LightKind::Ambient => self.ambient,
            LightKind::Directional => self.directional,
            LightKind::Point => self.point,
            LightKind::Spot => self.spot,
        }
    }

    pub fn set(&mut self, kind: LightKind, count: u32) {
        match kind {
            LightKind::Ambient => self.ambient = count,
            LightKind::Directional => self.directional = count,
            LightKind::Point => self.point = count,
            LightKind::Spot => self.spot = count,
        }
    }

    pub fn total(&self) -> u32 {
        self.ambient + self.directional + self.point + self.spot
    }
}
