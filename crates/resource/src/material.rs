use arbor_common::{Color, LightCounts, LightKind};
use arbor_device::{
    BlendEquation, BlendFactor, Capability, CompareFunc, Face, GraphicsDevice, PolygonMode,
    Winding,
};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::pool::TextureKey;
use crate::refcount::{RefCount, Resource};

bitflags! {
    /// Which scene lights a material's shader consumes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct UseLights: u8 {
        const AMBIENT     = 1 << 0;
        const DIRECTIONAL = 1 << 1;
        const POINT       = 1 << 2;
        const SPOT        = 1 << 3;
        const ALL = Self::AMBIENT.bits() | Self::DIRECTIONAL.bits() | Self::POINT.bits() | Self::SPOT.bits();
    }
}

impl UseLights {
    pub fn of(kind: LightKind) -> Self {
        match kind {
            LightKind::Ambient => Self::AMBIENT,
            LightKind::Directional => Self::DIRECTIONAL,
            LightKind::Point => Self::POINT,
            LightKind::Spot => Self::SPOT,
        }
    }

    /// Scene light counts with unused kinds zeroed.
    pub fn filter(self, counts: LightCounts) -> LightCounts {
        let mut out = LightCounts::default();
        for kind in LightKind::ALL {
            if self.contains(Self::of(kind)) {
                out.set(kind, counts.get(kind));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Explicit blend equations and factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomBlend {
    pub equation_rgb: BlendEquation,
    pub equation_alpha: BlendEquation,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blending {
    None,
    #[default]
    Normal,
    Additive,
    Subtractive,
    Multiply,
    Custom(CustomBlend),
}

/// Surface colors uploaded to the `Material` uniform array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub emissive: Color,
    pub shininess: f32,
    pub opacity: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            ambient: Color::WHITE,
            diffuse: Color::WHITE,
            specular: Color::rgb(0.5, 0.5, 0.5),
            emissive: Color::BLACK,
            shininess: 30.0,
            opacity: 1.0,
        }
    }
}

/// Render state plus shader selection for a surface.
#[derive(Debug)]
pub struct Material {
    refs: RefCount,
    pub shader: String,
    /// Shader does not depend on scene lights or texture counts.
    pub independent: bool,
    pub lights: UseLights,
    pub side: Side,
    pub wireframe: bool,
    pub depth_mask: bool,
    pub depth_test: bool,
    pub depth_func: CompareFunc,
    pub blending: Blending,
    pub line_width: f32,
    pub polygon_offset: Option<(f32, f32)>,
    pub surface: Surface,
    textures: Vec<TextureKey>,
}

impl Material {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            refs: RefCount::default(),
            shader: shader.into(),
            independent: false,
            lights: UseLights::ALL,
            side: Side::Front,
            wireframe: false,
            depth_mask: true,
            depth_test: true,
            depth_func: CompareFunc::LessEqual,
            blending: Blending::Normal,
            line_width: 1.0,
            polygon_offset: None,
            surface: Surface::default(),
            textures: Vec::new(),
        }
    }

    /// Unlit material rendered with the `basic` shader.
    pub fn basic() -> Self {
        Self {
            independent: true,
            lights: UseLights::empty(),
            ..Self::new("basic")
        }
    }

    /// Lit material rendered with the `standard` shader.
    pub fn standard(diffuse: Color) -> Self {
        let mut m = Self::new("standard");
        m.surface.diffuse = diffuse;
        m.surface.ambient = diffuse;
        m
    }

    pub fn textures(&self) -> &[TextureKey] {
        &self.textures
    }

    /// Record a texture reference. The caller has already taken a reference
    /// on the texture for this material.
    pub fn push_texture(&mut self, texture: TextureKey) {
        self.textures.push(texture);
    }

    pub(crate) fn take_textures(&mut self) -> Vec<TextureKey> {
        std::mem::take(&mut self.textures)
    }

    /// Apply this material's pipeline state.
    pub fn apply(&self, device: &mut dyn GraphicsDevice) {
        match self.side {
            Side::Front => {
                device.enable(Capability::CullFace);
                device.front_face(Winding::CounterClockwise);
                device.cull_face(Face::Back);
            }
            Side::Back => {
                device.enable(Capability::CullFace);
                device.front_face(Winding::Clockwise);
                device.cull_face(Face::Back);
            }
            Side::Double => device.disable(Capability::CullFace),
        }

        device.depth_mask(self.depth_mask);
        if self.depth_test {
            device.enable(Capability::DepthTest);
        } else {
            device.disable(Capability::DepthTest);
        }
        device.depth_func(self.depth_func);

        match self.polygon_offset {
            Some((factor, units)) => {
                device.enable(Capability::PolygonOffsetFill);
                device.polygon_offset(factor, units);
            }
            None => device.disable(Capability::PolygonOffsetFill),
        }

        let mode = if self.wireframe {
            PolygonMode::Line
        } else {
            PolygonMode::Fill
        };
        device.polygon_mode(Face::FrontAndBack, mode);
        device.line_width(self.line_width);

        self.apply_blending(device);
    }

    fn apply_blending(&self, device: &mut dyn GraphicsDevice) {
        use BlendFactor::*;
        if self.blending == Blending::None {
            device.disable(Capability::Blend);
            return;
        }
        device.enable(Capability::Blend);
        match self.blending {
            Blending::None => {}
            Blending::Normal => {
                device.blend_equation(BlendEquation::Add);
                device.blend_func_separate(SrcAlpha, OneMinusSrcAlpha, One, OneMinusSrcAlpha);
            }
            Blending::Additive => {
                device.blend_equation(BlendEquation::Add);
                device.blend_func(SrcAlpha, One);
            }
            Blending::Subtractive => {
                device.blend_equation(BlendEquation::Add);
                device.blend_func(Zero, OneMinusSrcColor);
            }
            Blending::Multiply => {
                device.blend_equation(BlendEquation::Add);
                device.blend_func(Zero, SrcColor);
            }
            Blending::Custom(c) => {
                device.blend_equation_separate(c.equation_rgb, c.equation_alpha);
                device.blend_func_separate(c.src_rgb, c.dst_rgb, c.src_alpha, c.dst_alpha);
            }
        }
    }
}

impl Resource for Material {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn refs_mut(&mut self) -> &mut RefCount {
        &mut self.refs
    }

    // Materials own no device handles; their textures are closed by the pool.
    fn release(&mut self, _device: &mut dyn GraphicsDevice) {}

    fn initialize(&mut self) {
        self.refs = RefCount::default();
    }
}
