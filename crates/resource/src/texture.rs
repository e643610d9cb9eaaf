use arbor_common::Color;
use arbor_device::{GraphicsDevice, TextureFilter, TextureId, TextureParam, TextureWrap};

use crate::error::ResourceError;
use crate::refcount::{RefCount, Resource};

/// 2D RGBA8 texture.
#[derive(Debug)]
pub struct Texture {
    refs: RefCount,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub mipmaps: bool,
    handle: Option<TextureId>,
    data_dirty: bool,
    params_dirty: bool,
}

impl Texture {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ResourceError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ResourceError::InvalidTextureData {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            refs: RefCount::default(),
            width,
            height,
            pixels,
            min_filter: TextureFilter::LinearMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
            mipmaps: true,
            handle: None,
            data_dirty: true,
            params_dirty: true,
        })
    }

    /// 1x1 texture of a single opaque color.
    pub fn solid(color: Color) -> Self {
        let px = [color.r, color.g, color.b, 1.0].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        Self {
            refs: RefCount::default(),
            width: 1,
            height: 1,
            pixels: px.to_vec(),
            min_filter: TextureFilter::Nearest,
            mag_filter: TextureFilter::Nearest,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            mipmaps: false,
            handle: None,
            data_dirty: true,
            params_dirty: true,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn handle(&self) -> Option<TextureId> {
        self.handle
    }

    pub fn set_pixels(&mut self, pixels: Vec<u8>) -> Result<(), ResourceError> {
        let expected = self.pixels.len();
        if pixels.len() != expected {
            return Err(ResourceError::InvalidTextureData {
                expected,
                actual: pixels.len(),
            });
        }
        self.pixels = pixels;
        self.data_dirty = true;
        Ok(())
    }

    /// Flag sampler parameters for re-upload after the public fields changed.
    pub fn touch_params(&mut self) {
        self.params_dirty = true;
    }

    /// Bind to `unit`, creating and uploading on first use.
    pub fn provide(&mut self, device: &mut dyn GraphicsDevice, unit: u32) {
        device.active_texture(unit);
        let handle = match self.handle {
            Some(h) => h,
            None => {
                let h = device.gen_texture();
                self.handle = Some(h);
                self.data_dirty = true;
                self.params_dirty = true;
                h
            }
        };
        device.bind_texture(Some(handle));
        if self.params_dirty {
            device.tex_parameter(TextureParam::MinFilter(self.min_filter));
            device.tex_parameter(TextureParam::MagFilter(self.mag_filter));
            device.tex_parameter(TextureParam::WrapS(self.wrap_s));
            device.tex_parameter(TextureParam::WrapT(self.wrap_t));
            self.params_dirty = false;
        }
        if self.data_dirty {
            device.tex_image_2d(self.width, self.height, &self.pixels);
            if self.mipmaps {
                device.generate_mipmap();
            }
            self.data_dirty = false;
        }
    }
}

impl Resource for Texture {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn refs_mut(&mut self) -> &mut RefCount {
        &mut self.refs
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(h) = self.handle.take() {
            device.delete_texture(h);
        }
    }

    fn initialize(&mut self) {
        self.refs = RefCount::default();
        self.data_dirty = true;
        self.params_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_device::RecordingDevice;

    #[test]
    fn rejects_wrong_pixel_count() {
        let err = Texture::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err, ResourceError::InvalidTextureData { expected: 16, actual: 15 });
    }

    #[test]
    fn uploads_once_until_changed() {
        let mut dev = RecordingDevice::new();
        let mut t = Texture::solid(Color::WHITE);
        t.provide(&mut dev, 0);
        t.provide(&mut dev, 0);
        let uploads = dev.log().iter().filter(|l| l.starts_with("tex_image_2d")).count();
        assert_eq!(uploads, 1);
        t.set_pixels(vec![0, 0, 0, 255]).unwrap();
        t.provide(&mut dev, 0);
        let uploads = dev.log().iter().filter(|l| l.starts_with("tex_image_2d")).count();
        assert_eq!(uploads, 2);
        assert_eq!(dev.live_textures(), 1);
    }
}
