use arbor_common::{Color, LightCounts, LightKind};
use glam::{Mat4, Vec3};

/// A light source occupying one slot of its kind's uniform array.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    kind: LightKind,
    slot: usize,
    pub color: Color,
    pub intensity: f32,
    /// Local direction for directional and spot lights.
    pub direction: Vec3,
    pub linear_decay: f32,
    pub quadratic_decay: f32,
    pub angular_decay: f32,
    /// Cosine of the spot cone's half angle.
    pub cutoff: f32,
}

impl Light {
    pub fn new(kind: LightKind, slot: usize, color: Color, intensity: f32) -> Self {
        Self {
            kind,
            slot,
            color,
            intensity,
            direction: Vec3::NEG_Z,
            linear_decay: 0.0,
            quadratic_decay: 0.0,
            angular_decay: 1.0,
            cutoff: 30f32.to_radians().cos(),
        }
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The `vec3` block this light writes into its uniform array, placed by
    /// the accumulated world matrix.
    pub fn uniform_block(&self, world: &Mat4) -> Vec<Vec3> {
        let color = self.color.scaled(self.intensity);
        let position = world.w_axis.truncate();
        let direction = world.transform_vector3(self.direction).normalize_or_zero();
        match self.kind {
            LightKind::Ambient => vec![color],
            LightKind::Directional => vec![color, direction],
            LightKind::Point => vec![
                color,
                position,
                Vec3::new(self.linear_decay, self.quadratic_decay, 0.0),
            ],
            LightKind::Spot => vec![
                color,
                position,
                direction,
                Vec3::new(self.angular_decay, self.cutoff, self.linear_decay),
                Vec3::new(self.quadratic_decay, 0.0, 0.0),
            ],
        }
    }
}

/// Per-kind slot allocator owned by a scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightSlots {
    counts: LightCounts,
}

impl LightSlots {
    pub fn allocate(&mut self, kind: LightKind) -> usize {
        let slot = self.counts.get(kind);
        self.counts.set(kind, slot + 1);
        slot as usize
    }

    /// Hand `slot` back if it is the last one allocated for `kind`. Lower
    /// slots stay taken so live lights keep their uniform positions.
    pub fn release(&mut self, kind: LightKind, slot: usize) -> bool {
        let count = self.counts.get(kind);
        if slot + 1 != count as usize {
            return false;
        }
        self.counts.set(kind, count - 1);
        true
    }

    pub fn counts(&self) -> LightCounts {
        self.counts
    }

    pub fn reset(&mut self) {
        self.counts = LightCounts::default();
    }
}
