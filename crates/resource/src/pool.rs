use arbor_device::GraphicsDevice;
use slotmap::{SlotMap, new_key_type};

use crate::error::ResourceError;
use crate::geometry::Geometry;
use crate::material::Material;
use crate::refcount::Resource;
use crate::texture::Texture;

new_key_type! {
    pub struct GeometryKey;
    pub struct MaterialKey;
    pub struct TextureKey;
}

/// Arena of shared resources addressed by typed keys.
///
/// A resource leaves the pool when its last reference is closed, so a stale
/// key can never be drawn with.
#[derive(Debug, Default)]
pub struct ResourcePool {
    geometries: SlotMap<GeometryKey, Geometry>,
    materials: SlotMap<MaterialKey, Material>,
    textures: SlotMap<TextureKey, Texture>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryKey {
        self.geometries.insert(geometry)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.materials.insert(material)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureKey {
        self.textures.insert(texture)
    }

    pub fn geometry(&self, key: GeometryKey) -> Result<&Geometry, ResourceError> {
        self.geometries
            .get(key)
            .ok_or(ResourceError::GeometryNotFound(key))
    }

    pub fn geometry_mut(&mut self, key: GeometryKey) -> Result<&mut Geometry, ResourceError> {
        self.geometries
            .get_mut(key)
            .ok_or(ResourceError::GeometryNotFound(key))
    }

    pub fn material(&self, key: MaterialKey) -> Result<&Material, ResourceError> {
        self.materials
            .get(key)
            .ok_or(ResourceError::MaterialNotFound(key))
    }

    pub fn material_mut(&mut self, key: MaterialKey) -> Result<&mut Material, ResourceError> {
        self.materials
            .get_mut(key)
            .ok_or(ResourceError::MaterialNotFound(key))
    }

    pub fn texture(&self, key: TextureKey) -> Result<&Texture, ResourceError> {
        self.textures
            .get(key)
            .ok_or(ResourceError::TextureNotFound(key))
    }

    pub fn texture_mut(&mut self, key: TextureKey) -> Result<&mut Texture, ResourceError> {
        self.textures
            .get_mut(key)
            .ok_or(ResourceError::TextureNotFound(key))
    }

    /// Take another reference on a geometry.
    pub fn share_geometry(&mut self, key: GeometryKey) -> Result<GeometryKey, ResourceError> {
        self.geometry_mut(key)?.increment();
        Ok(key)
    }

    pub fn share_material(&mut self, key: MaterialKey) -> Result<MaterialKey, ResourceError> {
        self.material_mut(key)?.increment();
        Ok(key)
    }

    pub fn share_texture(&mut self, key: TextureKey) -> Result<TextureKey, ResourceError> {
        self.texture_mut(key)?.increment();
        Ok(key)
    }

    /// Give a material its own reference on a texture.
    pub fn attach_texture(
        &mut self,
        material: MaterialKey,
        texture: TextureKey,
    ) -> Result<(), ResourceError> {
        self.material(material)?;
        self.share_texture(texture)?;
        self.material_mut(material)?.push_texture(texture);
        Ok(())
    }

    /// Drop one geometry reference. Returns true when it was released.
    pub fn close_geometry(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: GeometryKey,
    ) -> Result<bool, ResourceError> {
        let released = self.geometry_mut(key)?.close(device);
        if released {
            self.geometries.remove(key);
            tracing::debug!(?key, "geometry released");
        }
        Ok(released)
    }

    /// Drop one material reference; the last one also closes its textures.
    pub fn close_material(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: MaterialKey,
    ) -> Result<bool, ResourceError> {
        let material = self.material_mut(key)?;
        let released = material.close(device);
        if released {
            let textures = material.take_textures();
            self.materials.remove(key);
            tracing::debug!(?key, textures = textures.len(), "material released");
            for texture in textures {
                self.close_texture(device, texture)?;
            }
        }
        Ok(released)
    }

    pub fn close_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: TextureKey,
    ) -> Result<bool, ResourceError> {
        let released = self.texture_mut(key)?.close(device);
        if released {
            self.textures.remove(key);
            tracing::debug!(?key, "texture released");
        }
        Ok(released)
    }

    /// Apply a material's state and bind its textures to consecutive units.
    /// Returns the number of textures bound.
    pub fn provide_material(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: MaterialKey,
    ) -> Result<usize, ResourceError> {
        let material = self.material(key)?;
        material.apply(device);
        let textures = material.textures().to_vec();
        for (unit, texture) in textures.iter().enumerate() {
            self.texture_mut(*texture)?.provide(device, unit as u32);
        }
        Ok(textures.len())
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Release every resource regardless of outstanding references.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, mut g) in self.geometries.drain() {
            g.release(device);
        }
        self.materials.clear();
        for (_, mut t) in self.textures.drain() {
            t.release(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators;
    use arbor_common::Color;
    use arbor_device::RecordingDevice;

    #[test]
    fn shared_geometry_released_exactly_once() {
        let mut dev = RecordingDevice::new();
        let mut pool = ResourcePool::new();
        let key = pool.add_geometry(generators::axis(1.0));
        pool.geometry_mut(key).unwrap().provide(&mut dev, None);
        assert_eq!(pool.geometry(key).unwrap().refs().get(), 1);

        pool.share_geometry(key).unwrap();
        assert!(!pool.close_geometry(&mut dev, key).unwrap());
        assert!(pool.close_geometry(&mut dev, key).unwrap());
        assert_eq!(dev.released().buffers, 1);
        assert_eq!(dev.released().vertex_arrays, 1);

        // the key is stale now
        assert_eq!(
            pool.close_geometry(&mut dev, key),
            Err(ResourceError::GeometryNotFound(key))
        );
        assert_eq!(dev.invalid_releases(), 0);
    }

    #[test]
    fn material_release_cascades_to_textures() {
        let mut dev = RecordingDevice::new();
        let mut pool = ResourcePool::new();
        let tex = pool.add_texture(Texture::solid(Color::WHITE));
        let mat = pool.add_material(Material::standard(Color::WHITE));
        pool.attach_texture(mat, tex).unwrap();
        assert_eq!(pool.texture(tex).unwrap().refs().get(), 2);

        assert_eq!(pool.provide_material(&mut dev, mat).unwrap(), 1);
        assert_eq!(dev.live_textures(), 1);

        assert!(pool.close_material(&mut dev, mat).unwrap());
        // creator still holds one texture reference
        assert_eq!(pool.texture_count(), 1);
        assert!(pool.close_texture(&mut dev, tex).unwrap());
        assert_eq!(dev.live_textures(), 0);
    }

    #[test]
    fn attach_to_missing_material_fails() {
        let mut pool = ResourcePool::new();
        let tex = pool.add_texture(Texture::solid(Color::BLACK));
        let mat = pool.add_material(Material::basic());
        let mut dev = RecordingDevice::new();
        pool.close_material(&mut dev, mat).unwrap();
        assert_eq!(
            pool.attach_texture(mat, tex),
            Err(ResourceError::MaterialNotFound(mat))
        );
        assert_eq!(pool.texture(tex).unwrap().refs().get(), 1);
    }
}
