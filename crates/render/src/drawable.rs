use arbor_device::{DrawMode, GraphicsDevice};
use arbor_resource::{GeometryKey, MaterialKey, ResourceError, ResourcePool};
use glam::Mat4;

use crate::error::RenderError;
use crate::renderer::Renderer;

/// A material applied to `count` elements from `start`; `count == 0`
/// covers the whole drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawGroup {
    pub start: u32,
    pub count: u32,
    pub material: MaterialKey,
}

impl DrawGroup {
    pub fn contains(&self, index: u32) -> bool {
        self.count == 0 || (index >= self.start && index - self.start < self.count)
    }
}

/// Geometry bound to materials over index ranges.
///
/// The drawable owns one reference on its geometry and one per group on the
/// group's material; [`Drawable::close`] drops them all.
#[derive(Debug, PartialEq, Eq)]
pub struct Drawable {
    geometry: GeometryKey,
    groups: Vec<DrawGroup>,
    mode: DrawMode,
    pub renderable: bool,
}

impl Drawable {
    /// Take over the caller's references on `geometry` and `material`.
    pub fn new(geometry: GeometryKey, material: Option<MaterialKey>, mode: DrawMode) -> Self {
        let mut d = Self {
            geometry,
            groups: Vec::new(),
            mode,
            renderable: true,
        };
        if let Some(m) = material {
            d.push_group(m, 0, 0);
        }
        d
    }

    pub fn geometry(&self) -> GeometryKey {
        self.geometry
    }

    pub fn groups(&self) -> &[DrawGroup] {
        &self.groups
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    /// Apply `material` over `count` elements from `start`, taking a new
    /// reference on it.
    pub fn add_material(
        &mut self,
        pool: &mut ResourcePool,
        material: MaterialKey,
        start: u32,
        count: u32,
    ) -> Result<(), ResourceError> {
        pool.share_material(material)?;
        self.push_group(material, start, count);
        Ok(())
    }

    /// Apply `material` over the range of the geometry's group `group_index`.
    pub fn add_group_material(
        &mut self,
        pool: &mut ResourcePool,
        material: MaterialKey,
        group_index: usize,
    ) -> Result<(), ResourceError> {
        pool.material(material)?;
        let g = *pool.geometry(self.geometry)?.group(group_index)?;
        self.add_material(pool, material, g.start, g.count)
    }

    fn push_group(&mut self, material: MaterialKey, start: u32, count: u32) {
        self.groups.push(DrawGroup {
            start,
            count,
            material,
        });
    }

    /// Material of the first group whose range covers element `index`.
    pub fn material_at(&self, index: u32) -> Option<MaterialKey> {
        self.groups
            .iter()
            .find(|g| g.contains(index))
            .map(|g| g.material)
    }

    /// Issue one draw per group. Returns the number of draw calls.
    pub fn draw<D: GraphicsDevice>(
        &self,
        renderer: &mut Renderer<D>,
        pool: &mut ResourcePool,
        model: &Mat4,
    ) -> Result<usize, RenderError> {
        if !self.renderable {
            return Ok(0);
        }
        let mut draws = 0;
        for group in &self.groups {
            let program = renderer.use_material(pool, group.material)?;
            let geometry = pool.geometry_mut(self.geometry)?;
            geometry.provide(renderer.device_mut(), Some(program));
            renderer.upload_matrices(program, model);

            if geometry.is_indexed() {
                let count = match group.count {
                    0 => geometry.indices().len() as u32,
                    n => n,
                };
                let offset = group.start as usize * size_of::<u32>();
                renderer.device_mut().draw_elements(self.mode, count, offset);
            } else {
                let count = match group.count {
                    0 => geometry.vertex_count() as u32,
                    n => n,
                };
                renderer.device_mut().draw_arrays(self.mode, group.start, count);
            }
            renderer.record_draw();
            draws += 1;
        }
        Ok(draws)
    }

    /// Drop the geometry reference and every group's material reference.
    ///
    /// Keeps going after a failure and reports the first one.
    pub fn close(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pool: &mut ResourcePool,
    ) -> Result<(), ResourceError> {
        let mut first_err = None;
        for group in self.groups.drain(..) {
            if let Err(e) = pool.close_material(device, group.material) {
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = pool.close_geometry(device, self.geometry) {
            first_err.get_or_insert(e);
        }
        self.renderable = false;
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RenderSettings;
    use arbor_common::Color;
    use arbor_device::RecordingDevice;
    use arbor_resource::{Material, SphereParams, generators};
    use arbor_shader::ShaderCache;

    fn setup() -> (Renderer<RecordingDevice>, ResourcePool) {
        let r = Renderer::new(
            RecordingDevice::new(),
            ShaderCache::default(),
            RenderSettings::default(),
        );
        (r, ResourcePool::new())
    }

    #[test]
    fn material_at_respects_ranges() {
        let mut pool = ResourcePool::new();
        let g = pool.add_geometry(generators::axis(1.0));
        let a = pool.add_material(Material::basic());
        let b = pool.add_material(Material::basic());
        let mut d = Drawable::new(g, None, DrawMode::Lines);
        d.add_material(&mut pool, a, 0, 2).unwrap();
        d.add_material(&mut pool, b, 2, 4).unwrap();
        assert_eq!(d.material_at(0), Some(a));
        assert_eq!(d.material_at(1), Some(a));
        assert_eq!(d.material_at(2), Some(b));
        assert_eq!(d.material_at(5), Some(b));
        assert_eq!(d.material_at(6), None);
    }

    #[test]
    fn zero_count_group_covers_everything() {
        let mut pool = ResourcePool::new();
        let g = pool.add_geometry(generators::axis(1.0));
        let m = pool.add_material(Material::basic());
        let d = Drawable::new(g, Some(m), DrawMode::Lines);
        assert_eq!(d.material_at(1000), Some(m));
    }

    #[test]
    fn invalid_group_index_is_rejected() {
        let mut pool = ResourcePool::new();
        let g = pool.add_geometry(generators::axis(1.0));
        let m = pool.add_material(Material::basic());
        let mut d = Drawable::new(g, None, DrawMode::Lines);
        assert_eq!(
            d.add_group_material(&mut pool, m, 3),
            Err(ResourceError::InvalidGroupIndex { index: 3, groups: 1 })
        );
        d.add_group_material(&mut pool, m, 0).unwrap();
        assert_eq!(d.groups()[0].count, 6);
    }

    #[test]
    fn indexed_draw_uses_byte_offset() {
        let (mut r, mut pool) = setup();
        let g = pool.add_geometry(generators::sphere(&SphereParams::default()));
        let m = pool.add_material(Material::standard(Color::WHITE));
        let mut d = Drawable::new(g, None, DrawMode::Triangles);
        d.add_material(&mut pool, m, 6, 12).unwrap();
        assert_eq!(d.draw(&mut r, &mut pool, &Mat4::IDENTITY).unwrap(), 1);
        let rec = r.device().draws()[0];
        assert!(rec.indexed);
        assert_eq!(rec.first, 24);
        assert_eq!(rec.count, 12);
        assert_eq!(r.stats().draw_calls, 1);
    }

    #[test]
    fn array_draw_defaults_to_vertex_count() {
        let (mut r, mut pool) = setup();
        let g = pool.add_geometry(generators::axis(1.0));
        let m = pool.add_material(Material::basic());
        let d = Drawable::new(g, Some(m), DrawMode::Lines);
        d.draw(&mut r, &mut pool, &Mat4::IDENTITY).unwrap();
        let rec = r.device().draws()[0];
        assert!(!rec.indexed);
        assert_eq!(rec.mode, DrawMode::Lines);
        assert_eq!((rec.first, rec.count), (0, 6));
    }

    #[test]
    fn attributes_bound_from_active_program() {
        let (mut r, mut pool) = setup();
        let g = pool.add_geometry(generators::axis(1.0));
        let m = pool.add_material(Material::basic());
        let d = Drawable::new(g, Some(m), DrawMode::Lines);
        d.draw(&mut r, &mut pool, &Mat4::IDENTITY).unwrap();
        let pointers = r
            .device()
            .log()
            .iter()
            .filter(|l| l.starts_with("vertex_attrib_pointer"))
            .count();
        assert_eq!(pointers, 2);
    }

    #[test]
    fn close_releases_owned_references() {
        let (mut r, mut pool) = setup();
        let g = pool.add_geometry(generators::axis(1.0));
        let m = pool.add_material(Material::basic());
        let mut d = Drawable::new(g, Some(m), DrawMode::Lines);
        d.draw(&mut r, &mut pool, &Mat4::IDENTITY).unwrap();
        d.close(r.device_mut(), &mut pool).unwrap();
        assert_eq!(pool.geometry_count(), 0);
        assert_eq!(pool.material_count(), 0);
        assert_eq!(r.device().live_buffers(), 0);
        assert!(!d.renderable);
    }

    #[test]
    fn group_ranges_near_the_top_do_not_overflow() {
        let mut pool = ResourcePool::new();
        let m = pool.add_material(Material::basic());
        let g = DrawGroup {
            start: u32::MAX - 1,
            count: 4,
            material: m,
        };
        assert!(g.contains(u32::MAX));
        assert!(!g.contains(u32::MAX - 2));
        assert!(!g.contains(0));
    }

    #[test]
    fn reused_material_is_counted_per_group() {
        let (mut r, mut pool) = setup();
        let g = pool.add_geometry(generators::axis(1.0));
        let m = pool.add_material(Material::basic());
        let mut d = Drawable::new(g, Some(m), DrawMode::Lines);
        d.add_group_material(&mut pool, m, 0).unwrap();
        d.close(r.device_mut(), &mut pool).unwrap();
        assert_eq!(pool.material_count(), 0);
    }

    #[test]
    fn closing_one_owner_keeps_shared_material() {
        let (mut r, mut pool) = setup();
        let g1 = pool.add_geometry(generators::axis(1.0));
        let g2 = pool.add_geometry(generators::axis(2.0));
        let m = pool.add_material(Material::basic());
        let mut first = Drawable::new(g1, Some(m), DrawMode::Lines);
        let mut second = Drawable::new(g2, None, DrawMode::Lines);
        second.add_material(&mut pool, m, 0, 0).unwrap();

        first.close(r.device_mut(), &mut pool).unwrap();
        assert!(pool.material(m).is_ok());
        assert_eq!(second.draw(&mut r, &mut pool, &Mat4::IDENTITY).unwrap(), 1);

        second.close(r.device_mut(), &mut pool).unwrap();
        assert_eq!(pool.material_count(), 0);
    }

    #[test]
    fn hidden_drawable_issues_nothing() {
        let (mut r, mut pool) = setup();
        let g = pool.add_geometry(generators::axis(1.0));
        let m = pool.add_material(Material::basic());
        let mut d = Drawable::new(g, Some(m), DrawMode::Lines);
        d.renderable = false;
        assert_eq!(d.draw(&mut r, &mut pool, &Mat4::IDENTITY).unwrap(), 0);
        assert!(r.device().draws().is_empty());
    }
}
