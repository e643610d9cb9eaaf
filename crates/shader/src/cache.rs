use arbor_common::LightCounts;
use arbor_device::{GraphicsDevice, ProgramId, ShaderId, ShaderStage};
use arbor_resource::Material;

use crate::error::ShaderError;
use crate::profile::{Profile, ShaderSources};
use crate::templates::Templates;

/// Linked programs keyed by the profile they were built for.
#[derive(Debug, Default)]
pub struct ShaderCache {
    templates: Templates,
    sources: ShaderSources,
    programs: Vec<(Profile, ProgramId)>,
    generated: usize,
}

impl ShaderCache {
    pub fn new(templates: Templates) -> Self {
        Self {
            templates,
            ..Self::default()
        }
    }

    pub fn templates_mut(&mut self) -> &mut Templates {
        &mut self.templates
    }

    pub fn sources(&self) -> &ShaderSources {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut ShaderSources {
        &mut self.sources
    }

    pub fn profile_for(&self, material: &Material, lights: LightCounts) -> Profile {
        Profile::for_material(material, lights, &self.sources)
    }

    /// Activate a program serving `profile`, building it on a cache miss.
    pub fn set_program(
        &mut self,
        device: &mut dyn GraphicsDevice,
        profile: &Profile,
    ) -> Result<ProgramId, ShaderError> {
        if let Some((_, id)) = self.programs.iter().find(|(p, _)| p.matches(profile)) {
            device.use_program(Some(*id));
            return Ok(*id);
        }
        let id = self.generate(device, profile)?;
        self.programs.push((profile.clone(), id));
        device.use_program(Some(id));
        Ok(id)
    }

    fn generate(
        &mut self,
        device: &mut dyn GraphicsDevice,
        profile: &Profile,
    ) -> Result<ProgramId, ShaderError> {
        let src = &profile.source;
        let _span = tracing::debug_span!("generate_program", tag = %src.tag).entered();
        let ctx = profile.context();

        let stages = [
            (ShaderStage::Fragment, &src.fragment),
            (ShaderStage::Geometry, &src.geometry),
            (ShaderStage::Vertex, &src.vertex),
        ];
        let mut shaders: Vec<ShaderId> = Vec::new();
        for (stage, key) in stages {
            if key.is_empty() {
                continue;
            }
            let compiled = self
                .templates
                .render(key, &ctx)
                .and_then(|code| compile(device, stage, key, &code));
            match compiled {
                Ok(shader) => shaders.push(shader),
                Err(e) => {
                    for s in shaders {
                        device.delete_shader(s);
                    }
                    return Err(e);
                }
            }
        }

        let program = device.create_program();
        for s in &shaders {
            device.attach_shader(program, *s);
        }
        device.link_program(program);
        let linked = device.link_status(program);
        let log = device.program_info_log(program);
        for s in shaders {
            device.delete_shader(s);
        }
        if !linked {
            device.delete_program(program);
            return Err(ShaderError::Link {
                tag: src.tag.clone(),
                log,
            });
        }

        self.generated += 1;
        tracing::debug!(
            %program,
            ambient = profile.lights_max.ambient,
            directional = profile.lights_max.directional,
            point = profile.lights_max.point,
            spot = profile.lights_max.spot,
            textures = profile.textures_max,
            "program linked"
        );
        Ok(program)
    }

    /// Programs built since creation.
    pub fn generated(&self) -> usize {
        self.generated
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Delete every cached program.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, id) in self.programs.drain(..) {
            device.delete_program(id);
        }
    }
}

fn compile(
    device: &mut dyn GraphicsDevice,
    stage: ShaderStage,
    name: &str,
    code: &str,
) -> Result<ShaderId, ShaderError> {
    let shader = device.create_shader(stage);
    device.shader_source(shader, code);
    device.compile_shader(shader);
    if !device.compile_status(shader) {
        let log = device.shader_info_log(shader);
        device.delete_shader(shader);
        return Err(ShaderError::Compile {
            stage: stage.name(),
            name: name.to_string(),
            log,
        });
    }
    Ok(shader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::Color;
    use arbor_device::RecordingDevice;

    fn counts(point: u32) -> LightCounts {
        LightCounts {
            ambient: 1,
            point,
            ..LightCounts::default()
        }
    }

    #[test]
    fn equal_profiles_compile_once() {
        let mut dev = RecordingDevice::new();
        let mut cache = ShaderCache::default();
        let m = Material::standard(Color::WHITE);
        let p = cache.profile_for(&m, counts(1));

        let a = cache.set_program(&mut dev, &p).unwrap();
        let compiles = dev.compile_count();
        let b = cache.set_program(&mut dev, &p.clone()).unwrap();

        assert_eq!(a, b);
        assert_eq!(dev.compile_count(), compiles);
        assert_eq!(cache.generated(), 1);
        assert_eq!(dev.current_program(), Some(a));
    }

    #[test]
    fn independent_material_shares_program_across_light_counts() {
        let mut dev = RecordingDevice::new();
        let mut cache = ShaderCache::default();
        let m = Material::basic();
        let a = cache.set_program(&mut dev, &cache.profile_for(&m, counts(0))).unwrap();
        let b = cache.set_program(&mut dev, &cache.profile_for(&m, counts(5))).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn new_light_count_builds_new_program() {
        let mut dev = RecordingDevice::new();
        let mut cache = ShaderCache::default();
        let m = Material::standard(Color::WHITE);
        let a = cache.set_program(&mut dev, &cache.profile_for(&m, counts(1))).unwrap();
        let b = cache.set_program(&mut dev, &cache.profile_for(&m, counts(2))).unwrap();
        assert_ne!(a, b);
        assert!(dev.program_source(b).contains("PointLight[6]"));
    }

    #[test]
    fn compile_failure_carries_log_and_cleans_up() {
        let mut dev = RecordingDevice::new();
        dev.fail_compile_on("gl_Position");
        let mut cache = ShaderCache::default();
        let p = cache.profile_for(&Material::basic(), LightCounts::default());
        let err = cache.set_program(&mut dev, &p).unwrap_err();
        match err {
            ShaderError::Compile { stage, log, .. } => {
                assert_eq!(stage, "vertex");
                assert!(log.contains("gl_Position"));
            }
            other => panic!("unexpected {other}"),
        }
        assert!(cache.is_empty());
        assert_eq!(dev.live_programs(), 0);
        assert_eq!(dev.invalid_releases(), 0);
        // fragment compiled, vertex failed: both deleted
        assert_eq!(dev.released().shaders, 2);
    }

    #[test]
    fn link_failure_is_not_cached() {
        let mut dev = RecordingDevice::new();
        dev.fail_links(true);
        let mut cache = ShaderCache::default();
        let p = cache.profile_for(&Material::basic(), LightCounts::default());
        assert!(matches!(
            cache.set_program(&mut dev, &p),
            Err(ShaderError::Link { .. })
        ));
        dev.fail_links(false);
        assert!(cache.set_program(&mut dev, &p).is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_deletes_programs() {
        let mut dev = RecordingDevice::new();
        let mut cache = ShaderCache::default();
        let p = cache.profile_for(&Material::basic(), LightCounts::default());
        cache.set_program(&mut dev, &p).unwrap();
        cache.clear(&mut dev);
        assert!(cache.is_empty());
        assert_eq!(dev.live_programs(), 0);
    }
}
