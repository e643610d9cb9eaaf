use std::fmt;

use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Vertex or index buffer object.
    BufferId
);
handle!(
    /// Vertex array object holding attribute bindings.
    VertexArrayId
);
handle!(TextureId);
handle!(ShaderId);
handle!(
    /// Linked shader program.
    ProgramId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    DepthTest,
    CullFace,
    Blend,
    Multisample,
    PolygonOffsetFill,
    PolygonOffsetLine,
    ProgramPointSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    #[default]
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Point,
    Line,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureParam {
    MinFilter(TextureFilter),
    MagFilter(TextureFilter),
    WrapS(TextureWrap),
    WrapT(TextureWrap),
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClearMask: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// The primitive GPU operations the scene graph issues.
///
/// Every call is synchronous and side-effect-only; the only state read back
/// is handle allocation, compile/link status with info logs, and locations.
pub trait GraphicsDevice {
    /// Backend description, e.g. the driver's version string.
    fn version(&self) -> String;

    fn gen_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn delete_buffer(&mut self, buffer: BufferId);

    fn gen_vertex_array(&mut self) -> VertexArrayId;
    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>);
    fn delete_vertex_array(&mut self, vao: VertexArrayId);

    /// Location of a vertex attribute in a linked program, `None` when the
    /// program does not use it.
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32>;
    fn enable_vertex_attrib(&mut self, location: u32);
    /// Float attribute pointer; `stride` and `offset` are in bytes.
    fn vertex_attrib_pointer(&mut self, location: u32, size: u32, stride: u32, offset: u32);

    fn gen_texture(&mut self) -> TextureId;
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: Option<TextureId>);
    fn tex_image_2d(&mut self, width: u32, height: u32, rgba: &[u8]);
    fn tex_parameter(&mut self, param: TextureParam);
    fn generate_mipmap(&mut self);
    fn delete_texture(&mut self, texture: TextureId);

    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId;
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    fn compile_shader(&mut self, shader: ShaderId);
    fn compile_status(&self, shader: ShaderId) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> ProgramId;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn link_program(&mut self, program: ProgramId);
    fn link_status(&self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn use_program(&mut self, program: Option<ProgramId>);
    fn delete_program(&mut self, program: ProgramId);

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    fn uniform_1f(&mut self, location: UniformLocation, value: f32);
    fn uniform_3f(&mut self, location: UniformLocation, value: Vec3);
    fn uniform_4f(&mut self, location: UniformLocation, value: Vec4);
    fn uniform_3fv(&mut self, location: UniformLocation, values: &[Vec3]);
    fn uniform_matrix4(&mut self, location: UniformLocation, value: &Mat4);

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32);
    /// Indexed draw over `u32` indices; `offset` is in bytes into the index buffer.
    fn draw_elements(&mut self, mode: DrawMode, count: u32, offset: usize);

    fn enable(&mut self, cap: Capability);
    fn disable(&mut self, cap: Capability);
    fn depth_mask(&mut self, write: bool);
    fn depth_func(&mut self, func: CompareFunc);
    fn front_face(&mut self, winding: Winding);
    fn cull_face(&mut self, face: Face);
    fn polygon_mode(&mut self, face: Face, mode: PolygonMode);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn line_width(&mut self, width: f32);
    fn point_size(&mut self, size: f32);
    fn blend_equation(&mut self, eq: BlendEquation);
    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );

    fn clear_color(&mut self, color: Vec4);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, value: i32);
    fn clear(&mut self, mask: ClearMask);
}
