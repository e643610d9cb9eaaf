use std::collections::{BTreeMap, BTreeSet};

use glam::{Mat4, Vec3, Vec4};

use crate::device::*;

/// A value last written to a uniform location.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Vec3Array(Vec<Vec3>),
    Mat4(Mat4),
}

/// One submitted draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub mode: DrawMode,
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub indexed: bool,
    /// First vertex for array draws, byte offset for indexed draws.
    pub first: usize,
    pub count: u32,
}

/// How many handles of each kind were deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseCounts {
    pub buffers: usize,
    pub vertex_arrays: usize,
    pub textures: usize,
    pub shaders: usize,
    pub programs: usize,
}

#[derive(Debug, Clone)]
struct ShaderRecord {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Clone, Default)]
struct ProgramRecord {
    shaders: Vec<ShaderId>,
    /// Stage sources captured at link time.
    sources: Vec<(ShaderStage, String)>,
    linked: bool,
    log: String,
    attribs: BTreeMap<String, u32>,
}

/// Headless [`GraphicsDevice`] for tests, tooling and the CLI.
///
/// Hands out monotonic handles, keeps a textual call log and tracks which
/// handles are alive. Attribute and uniform locations exist only for names
/// that appear in the linked program's sources, like a real driver that
/// strips unused inputs.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_handle: u32,
    next_location: i32,
    log: Vec<String>,

    buffers: BTreeSet<BufferId>,
    vertex_arrays: BTreeSet<VertexArrayId>,
    textures: BTreeSet<TextureId>,
    shaders: BTreeMap<ShaderId, ShaderRecord>,
    programs: BTreeMap<ProgramId, ProgramRecord>,
    released: ReleaseCounts,
    invalid_releases: usize,

    current_program: Option<ProgramId>,
    bound_vertex_array: Option<VertexArrayId>,
    locations: BTreeMap<UniformLocation, (ProgramId, String)>,
    program_locations: BTreeMap<(ProgramId, String), UniformLocation>,
    uniforms: BTreeMap<(ProgramId, String), UniformValue>,

    draws: Vec<DrawRecord>,
    compiles: usize,
    links: usize,
    enabled: BTreeSet<Capability>,
    depth_func: CompareFunc,
    line_width: f32,

    fail_marker: Option<String>,
    fail_link: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            line_width: 1.0,
            ..Self::default()
        }
    }

    /// Make every shader whose source contains `marker` fail to compile.
    pub fn fail_compile_on(&mut self, marker: impl Into<String>) {
        self.fail_marker = Some(marker.into());
    }

    /// Make every subsequent link fail.
    pub fn fail_links(&mut self, fail: bool) {
        self.fail_link = fail;
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    /// Number of `compile_shader` calls.
    pub fn compile_count(&self) -> usize {
        self.compiles
    }

    pub fn link_count(&self) -> usize {
        self.links
    }

    pub fn released(&self) -> ReleaseCounts {
        self.released
    }

    /// Deletes of handles that were not alive (double frees).
    pub fn invalid_releases(&self) -> usize {
        self.invalid_releases
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.enabled.contains(&cap)
    }

    pub fn current_depth_func(&self) -> CompareFunc {
        self.depth_func
    }

    pub fn current_line_width(&self) -> f32 {
        self.line_width
    }

    /// Last value written to `name` on `program`.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(&(program, name.to_string()))
    }

    /// Concatenated sources of a program's stages.
    pub fn program_source(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|p| {
                p.sources
                    .iter()
                    .map(|(_, src)| src.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    /// Human-readable digest of the device state.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("=== Device ({}) ===\n", self.version()));
        out.push_str(&format!(
            "Live: buffers={} vaos={} textures={} programs={}\n",
            self.buffers.len(),
            self.vertex_arrays.len(),
            self.textures.len(),
            self.programs.len()
        ));
        out.push_str(&format!(
            "Released: buffers={} vaos={} textures={} shaders={} programs={}\n",
            self.released.buffers,
            self.released.vertex_arrays,
            self.released.textures,
            self.released.shaders,
            self.released.programs
        ));
        out.push_str(&format!(
            "Compiles: {} Links: {} Draws: {}\n",
            self.compiles,
            self.links,
            self.draws.len()
        ));
        for d in &self.draws {
            out.push_str(&format!(
                "  {:?} indexed={} first={} count={}\n",
                d.mode, d.indexed, d.first, d.count
            ));
        }
        out
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn record(&mut self, entry: String) {
        tracing::trace!(call = %entry, "device");
        self.log.push(entry);
    }

    fn release<T: Ord>(set: &mut BTreeSet<T>, handle: T, counter: &mut usize, invalid: &mut usize) {
        if set.remove(&handle) {
            *counter += 1;
        } else {
            *invalid += 1;
        }
    }

    fn store_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if let Some((program, name)) = self.locations.get(&location).cloned() {
            self.record(format!("uniform {name} = {value:?}"));
            self.uniforms.insert((program, name), value);
        }
    }

    fn uses_name(&self, program: ProgramId, name: &str, stage: Option<ShaderStage>) -> bool {
        self.programs.get(&program).is_some_and(|p| {
            p.linked
                && p.sources
                    .iter()
                    .any(|(st, src)| stage.is_none_or(|want| *st == want) && src.contains(name))
        })
    }
}

impl GraphicsDevice for RecordingDevice {
    fn version(&self) -> String {
        "recording 4.1".to_string()
    }

    fn gen_buffer(&mut self) -> BufferId {
        let id = BufferId(self.handle());
        self.buffers.insert(id);
        self.record(format!("gen_buffer -> {id}"));
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.record(format!("bind_buffer {target:?} {buffer:?}"));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.record(format!("buffer_data {target:?} {} bytes {usage:?}", data.len()));
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        Self::release(
            &mut self.buffers,
            buffer,
            &mut self.released.buffers,
            &mut self.invalid_releases,
        );
        self.record(format!("delete_buffer {buffer}"));
    }

    fn gen_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(self.handle());
        self.vertex_arrays.insert(id);
        self.record(format!("gen_vertex_array -> {id}"));
        id
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.bound_vertex_array = vao;
        self.record(format!("bind_vertex_array {vao:?}"));
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        Self::release(
            &mut self.vertex_arrays,
            vao,
            &mut self.released.vertex_arrays,
            &mut self.invalid_releases,
        );
        if self.bound_vertex_array == Some(vao) {
            self.bound_vertex_array = None;
        }
        self.record(format!("delete_vertex_array {vao}"));
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        if !self.uses_name(program, name, Some(ShaderStage::Vertex)) {
            return None;
        }
        let rec = self.programs.get_mut(&program)?;
        let next = rec.attribs.len() as u32;
        Some(*rec.attribs.entry(name.to_string()).or_insert(next))
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        self.record(format!("enable_vertex_attrib {location}"));
    }

    fn vertex_attrib_pointer(&mut self, location: u32, size: u32, stride: u32, offset: u32) {
        self.record(format!(
            "vertex_attrib_pointer {location} size={size} stride={stride} offset={offset}"
        ));
    }

    fn gen_texture(&mut self) -> TextureId {
        let id = TextureId(self.handle());
        self.textures.insert(id);
        self.record(format!("gen_texture -> {id}"));
        id
    }

    fn active_texture(&mut self, unit: u32) {
        self.record(format!("active_texture {unit}"));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.record(format!("bind_texture {texture:?}"));
    }

    fn tex_image_2d(&mut self, width: u32, height: u32, rgba: &[u8]) {
        self.record(format!("tex_image_2d {width}x{height} {} bytes", rgba.len()));
    }

    fn tex_parameter(&mut self, param: TextureParam) {
        self.record(format!("tex_parameter {param:?}"));
    }

    fn generate_mipmap(&mut self) {
        self.record("generate_mipmap".to_string());
    }

    fn delete_texture(&mut self, texture: TextureId) {
        Self::release(
            &mut self.textures,
            texture,
            &mut self.released.textures,
            &mut self.invalid_releases,
        );
        self.record(format!("delete_texture {texture}"));
    }

    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let id = ShaderId(self.handle());
        self.shaders.insert(
            id,
            ShaderRecord {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        self.record(format!("create_shader {} -> {id}", stage.name()));
        id
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        if let Some(rec) = self.shaders.get_mut(&shader) {
            rec.source = source.to_string();
        }
        self.record(format!("shader_source {shader} {} bytes", source.len()));
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        self.compiles += 1;
        let marker = self.fail_marker.clone();
        if let Some(rec) = self.shaders.get_mut(&shader) {
            let failed_on = marker.filter(|m| rec.source.contains(m.as_str()));
            if let Some(m) = failed_on {
                rec.compiled = false;
                rec.log = format!("ERROR: 0:1: '{m}' : syntax error");
            } else if rec.source.trim().is_empty() {
                rec.compiled = false;
                rec.log = "ERROR: 0:0: empty source".to_string();
            } else {
                rec.compiled = true;
                rec.log.clear();
            }
        }
        self.record(format!("compile_shader {shader}"));
    }

    fn compile_status(&self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if self.shaders.remove(&shader).is_some() {
            self.released.shaders += 1;
        } else {
            self.invalid_releases += 1;
        }
        self.record(format!("delete_shader {shader}"));
    }

    fn create_program(&mut self) -> ProgramId {
        let id = ProgramId(self.handle());
        self.programs.insert(id, ProgramRecord::default());
        self.record(format!("create_program -> {id}"));
        id
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(rec) = self.programs.get_mut(&program) {
            rec.shaders.push(shader);
        }
        self.record(format!("attach_shader {program} {shader}"));
    }

    fn link_program(&mut self, program: ProgramId) {
        self.links += 1;
        let stages_ok = self
            .programs
            .get(&program)
            .is_some_and(|p| p.shaders.iter().all(|s| self.compile_status(*s)));
        let fail_link = self.fail_link;
        let sources: Vec<(ShaderStage, String)> = self
            .programs
            .get(&program)
            .map(|p| {
                p.shaders
                    .iter()
                    .filter_map(|s| self.shaders.get(s))
                    .map(|rec| (rec.stage, rec.source.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(rec) = self.programs.get_mut(&program) {
            rec.sources = sources;
            rec.linked = stages_ok && !fail_link;
            rec.log = if rec.linked {
                String::new()
            } else if fail_link {
                "link error: injected failure".to_string()
            } else {
                "link error: attached shader not compiled".to_string()
            };
        }
        self.record(format!("link_program {program}"));
    }

    fn link_status(&self, program: ProgramId) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.record(format!("use_program {program:?}"));
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            self.released.programs += 1;
            self.locations.retain(|_, (p, _)| *p != program);
            self.program_locations.retain(|(p, _), _| *p != program);
            self.uniforms.retain(|(p, _), _| *p != program);
        } else {
            self.invalid_releases += 1;
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.record(format!("delete_program {program}"));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if !self.uses_name(program, name, None) {
            return None;
        }
        let key = (program, name.to_string());
        if let Some(loc) = self.program_locations.get(&key) {
            return Some(*loc);
        }
        let loc = UniformLocation(self.next_location);
        self.next_location += 1;
        self.locations.insert(loc, key.clone());
        self.program_locations.insert(key, loc);
        Some(loc)
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.store_uniform(location, UniformValue::Int(value));
    }

    fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
        self.store_uniform(location, UniformValue::Float(value));
    }

    fn uniform_3f(&mut self, location: UniformLocation, value: Vec3) {
        self.store_uniform(location, UniformValue::Vec3(value));
    }

    fn uniform_4f(&mut self, location: UniformLocation, value: Vec4) {
        self.store_uniform(location, UniformValue::Vec4(value));
    }

    fn uniform_3fv(&mut self, location: UniformLocation, values: &[Vec3]) {
        self.store_uniform(location, UniformValue::Vec3Array(values.to_vec()));
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, value: &Mat4) {
        self.store_uniform(location, UniformValue::Mat4(*value));
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.draws.push(DrawRecord {
            mode,
            program: self.current_program,
            vertex_array: self.bound_vertex_array,
            indexed: false,
            first: first as usize,
            count,
        });
        self.record(format!("draw_arrays {mode:?} first={first} count={count}"));
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, offset: usize) {
        self.draws.push(DrawRecord {
            mode,
            program: self.current_program,
            vertex_array: self.bound_vertex_array,
            indexed: true,
            first: offset,
            count,
        });
        self.record(format!("draw_elements {mode:?} count={count} offset={offset}"));
    }

    fn enable(&mut self, cap: Capability) {
        self.enabled.insert(cap);
        self.record(format!("enable {cap:?}"));
    }

    fn disable(&mut self, cap: Capability) {
        self.enabled.remove(&cap);
        self.record(format!("disable {cap:?}"));
    }

    fn depth_mask(&mut self, write: bool) {
        self.record(format!("depth_mask {write}"));
    }

    fn depth_func(&mut self, func: CompareFunc) {
        self.depth_func = func;
        self.record(format!("depth_func {func:?}"));
    }

    fn front_face(&mut self, winding: Winding) {
        self.record(format!("front_face {winding:?}"));
    }

    fn cull_face(&mut self, face: Face) {
        self.record(format!("cull_face {face:?}"));
    }

    fn polygon_mode(&mut self, face: Face, mode: PolygonMode) {
        self.record(format!("polygon_mode {face:?} {mode:?}"));
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.record(format!("polygon_offset {factor} {units}"));
    }

    fn line_width(&mut self, width: f32) {
        self.line_width = width;
        self.record(format!("line_width {width}"));
    }

    fn point_size(&mut self, size: f32) {
        self.record(format!("point_size {size}"));
    }

    fn blend_equation(&mut self, eq: BlendEquation) {
        self.record(format!("blend_equation {eq:?}"));
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.record(format!("blend_equation_separate {rgb:?} {alpha:?}"));
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.record(format!("blend_func {src:?} {dst:?}"));
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record(format!(
            "blend_func_separate {src_rgb:?} {dst_rgb:?} {src_alpha:?} {dst_alpha:?}"
        ));
    }

    fn clear_color(&mut self, color: Vec4) {
        self.record(format!("clear_color {color}"));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.record(format!("clear_depth {depth}"));
    }

    fn clear_stencil(&mut self, value: i32) {
        self.record(format!("clear_stencil {value}"));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.record(format!("clear {mask:?}"));
    }
}
