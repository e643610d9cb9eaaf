use std::collections::BTreeMap;

use arbor_common::{LightCounts, LightKind};
use arbor_device::{
    BlendEquation, BlendFactor, Capability, ClearMask, CompareFunc, Face, GraphicsDevice,
    ProgramId, Winding,
};
use arbor_resource::{MaterialKey, ResourcePool};
use arbor_shader::ShaderCache;
use glam::{Mat4, Vec3, Vec4};

use crate::error::RenderError;

/// Frame-independent renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub clear_color: Vec4,
    /// Deepest nesting a traversal descends into before skipping a subtree.
    pub max_depth: usize,
    pub point_size: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: Vec4::new(0.1, 0.1, 0.12, 1.0),
            max_depth: 256,
            point_size: 1.0,
        }
    }
}

/// Counters for the frame in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub draw_calls: usize,
    pub programs_bound: usize,
}

/// Light uniform data by kind, laid out as the shaders' `vec3` arrays.
///
/// Slots keep their last written value until [`LightEnvironment::clear`].
#[derive(Debug, Clone, Default)]
pub struct LightEnvironment {
    data: BTreeMap<LightKind, Vec<Vec3>>,
}

impl LightEnvironment {
    /// Write one light's uniform block into its slot.
    pub fn set(&mut self, kind: LightKind, slot: usize, block: &[Vec3]) {
        let stride = kind.uniform_stride();
        let values = self.data.entry(kind).or_default();
        let end = (slot + 1) * stride;
        if values.len() < end {
            values.resize(end, Vec3::ZERO);
        }
        for (dst, src) in values[slot * stride..end].iter_mut().zip(block) {
            *dst = *src;
        }
    }

    pub fn get(&self, kind: LightKind) -> &[Vec3] {
        self.data.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn upload(&self, device: &mut dyn GraphicsDevice, program: ProgramId) {
        for (kind, values) in &self.data {
            if values.is_empty() {
                continue;
            }
            if let Some(loc) = device.uniform_location(program, kind.uniform_name()) {
                device.uniform_3fv(loc, values);
            }
        }
    }
}

/// Forward renderer over a [`GraphicsDevice`].
///
/// Holds the per-frame view state the camera writes and the drawables read.
#[derive(Debug)]
pub struct Renderer<D: GraphicsDevice> {
    device: D,
    shaders: ShaderCache,
    settings: RenderSettings,
    view: Mat4,
    projection: Mat4,
    camera_position: Vec3,
    light_counts: LightCounts,
    lights: LightEnvironment,
    stats: FrameStats,
}

impl<D: GraphicsDevice> Renderer<D> {
    pub fn new(device: D, shaders: ShaderCache, settings: RenderSettings) -> Self {
        Self {
            device,
            shaders,
            settings,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            light_counts: LightCounts::default(),
            lights: LightEnvironment::default(),
            stats: FrameStats::default(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn shaders(&self) -> &ShaderCache {
        &self.shaders
    }

    pub fn shaders_mut(&mut self) -> &mut ShaderCache {
        &mut self.shaders
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Default pipeline state: depth test, back-face culling, alpha blending.
    pub fn initialize(&mut self) {
        let d = &mut self.device;
        d.clear_color(self.settings.clear_color);
        d.clear_depth(1.0);
        d.clear_stencil(0);
        d.enable(Capability::DepthTest);
        d.depth_func(CompareFunc::LessEqual);
        d.front_face(Winding::CounterClockwise);
        d.enable(Capability::CullFace);
        d.cull_face(Face::Back);
        d.enable(Capability::Blend);
        d.blend_equation(BlendEquation::Add);
        d.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        d.enable(Capability::Multisample);
        d.enable(Capability::ProgramPointSize);
        d.point_size(self.settings.point_size);
        tracing::debug!(version = %d.version(), "renderer initialized");
    }

    /// Clear the targets and the light environment; lights push fresh
    /// uniforms as the traversal reaches them.
    pub fn begin_frame(&mut self) {
        self.lights.clear();
        self.stats = FrameStats {
            frame: self.stats.frame + 1,
            ..FrameStats::default()
        };
        self.device
            .clear(ClearMask::COLOR | ClearMask::DEPTH | ClearMask::STENCIL);
    }

    pub fn end_frame(&mut self) -> FrameStats {
        self.device.use_program(None);
        self.stats
    }

    pub fn set_view(&mut self, view: Mat4, camera_position: Vec3) {
        self.view = view;
        self.camera_position = camera_position;
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Light counts used to size the uniform arrays of new programs.
    pub fn set_light_counts(&mut self, counts: LightCounts) {
        self.light_counts = counts;
    }

    pub fn light_counts(&self) -> LightCounts {
        self.light_counts
    }

    pub fn lights(&self) -> &LightEnvironment {
        &self.lights
    }

    pub fn set_light(&mut self, kind: LightKind, slot: usize, block: &[Vec3]) {
        self.lights.set(kind, slot, block);
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
        self.light_counts = LightCounts::default();
    }

    /// Bind the program and state for a material and upload its uniforms.
    pub fn use_material(
        &mut self,
        pool: &mut ResourcePool,
        key: MaterialKey,
    ) -> Result<ProgramId, RenderError> {
        let material = pool.material(key)?;
        let profile = self.shaders.profile_for(material, self.light_counts);
        let surface = material.surface;
        let program = self.shaders.set_program(&mut self.device, &profile)?;
        self.stats.programs_bound += 1;

        let textures = pool.provide_material(&mut self.device, key)?;
        let d = &mut self.device;
        if let Some(loc) = d.uniform_location(program, "Material") {
            let block = [
                surface.ambient.into(),
                surface.diffuse.into(),
                surface.specular.into(),
                surface.emissive.into(),
                Vec3::new(surface.shininess, surface.opacity, 0.0),
            ];
            d.uniform_3fv(loc, &block);
        }
        for unit in 0..textures {
            if let Some(loc) = d.uniform_location(program, &format!("MatTexture[{unit}]")) {
                d.uniform_1i(loc, unit as i32);
            }
        }
        self.lights.upload(&mut self.device, program);
        Ok(program)
    }

    /// Upload model, view and projection matrices for one draw.
    pub fn upload_matrices(&mut self, program: ProgramId, model: &Mat4) {
        let mvp = self.projection * self.view * *model;
        let d = &mut self.device;
        let mats = [
            ("ModelMatrix", *model),
            ("ViewMatrix", self.view),
            ("ProjectionMatrix", self.projection),
            ("MVP", mvp),
        ];
        for (name, m) in mats {
            if let Some(loc) = d.uniform_location(program, name) {
                d.uniform_matrix4(loc, &m);
            }
        }
        if let Some(loc) = d.uniform_location(program, "CameraPosition") {
            d.uniform_3f(loc, self.camera_position);
        }
    }

    pub(crate) fn record_draw(&mut self) {
        self.stats.draw_calls += 1;
    }

    /// Delete every cached program.
    pub fn release_programs(&mut self) {
        self.shaders.clear(&mut self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::Color;
    use arbor_device::{RecordingDevice, UniformValue};
    use arbor_resource::Material;

    fn renderer() -> Renderer<RecordingDevice> {
        Renderer::new(
            RecordingDevice::new(),
            ShaderCache::default(),
            RenderSettings::default(),
        )
    }

    #[test]
    fn settings_default() {
        let s = RenderSettings::default();
        assert_eq!(s.max_depth, 256);
        assert_eq!(s.point_size, 1.0);
    }

    #[test]
    fn initialize_sets_pipeline_defaults() {
        let mut r = renderer();
        r.initialize();
        let d = r.device();
        assert!(d.is_enabled(Capability::DepthTest));
        assert!(d.is_enabled(Capability::CullFace));
        assert!(d.is_enabled(Capability::Blend));
        assert_eq!(d.current_depth_func(), CompareFunc::LessEqual);
    }

    #[test]
    fn end_frame_unbinds_program() {
        let mut r = renderer();
        let mut pool = ResourcePool::new();
        let m = pool.add_material(Material::basic());
        r.begin_frame();
        r.use_material(&mut pool, m).unwrap();
        assert!(r.device().current_program().is_some());
        let stats = r.end_frame();
        assert_eq!(stats.frame, 1);
        assert_eq!(stats.programs_bound, 1);
        assert_eq!(r.device().current_program(), None);
    }

    #[test]
    fn light_slots_are_strided() {
        let mut env = LightEnvironment::default();
        env.set(LightKind::Directional, 1, &[Vec3::ONE, Vec3::X]);
        let v = env.get(LightKind::Directional);
        assert_eq!(v.len(), 4);
        assert_eq!(v[0], Vec3::ZERO);
        assert_eq!(v[2], Vec3::ONE);
        assert_eq!(v[3], Vec3::X);
    }

    #[test]
    fn lit_material_receives_light_uniforms() {
        let mut r = renderer();
        let mut pool = ResourcePool::new();
        let m = pool.add_material(Material::standard(Color::rgb(1.0, 0.0, 0.0)));
        r.set_light_counts(LightCounts {
            ambient: 1,
            ..LightCounts::default()
        });
        r.set_light(LightKind::Ambient, 0, &[Vec3::splat(0.5)]);
        let program = r.use_material(&mut pool, m).unwrap();
        assert_eq!(
            r.device().uniform(program, "AmbientLightColor"),
            Some(&UniformValue::Vec3Array(vec![Vec3::splat(0.5)]))
        );
        match r.device().uniform(program, "Material") {
            Some(UniformValue::Vec3Array(block)) => assert_eq!(block[1], Vec3::X),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mvp_combines_view_projection_and_model() {
        let mut r = renderer();
        let mut pool = ResourcePool::new();
        let m = pool.add_material(Material::basic());
        let proj = Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 10.0);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let model = Mat4::from_translation(Vec3::X);
        r.set_projection(proj);
        r.set_view(view, Vec3::new(0.0, 0.0, 5.0));
        let p = r.use_material(&mut pool, m).unwrap();
        r.upload_matrices(p, &model);
        assert_eq!(
            r.device().uniform(p, "MVP"),
            Some(&UniformValue::Mat4(proj * view * model))
        );
    }
}
