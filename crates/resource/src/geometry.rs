use arbor_device::{
    BufferId, BufferTarget, BufferUsage, GraphicsDevice, ProgramId, VertexArrayId,
};

use crate::error::ResourceError;
use crate::refcount::{RefCount, Resource};

/// A named float attribute inside an interleaved vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Component count (1 to 4).
    pub size: u32,
}

impl Attribute {
    pub fn new(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Interleaved `f32` vertex data plus its attribute layout.
#[derive(Debug)]
pub struct VertexBuffer {
    attributes: Vec<Attribute>,
    data: Vec<f32>,
    usage: BufferUsage,
    handle: Option<BufferId>,
    dirty: bool,
}

impl VertexBuffer {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            data: Vec::new(),
            usage: BufferUsage::StaticDraw,
            handle: None,
            dirty: false,
        }
    }

    pub fn with_data(attributes: Vec<Attribute>, data: Vec<f32>) -> Self {
        let mut vb = Self::new(attributes);
        vb.set_data(data);
        vb
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn set_data(&mut self, data: Vec<f32>) {
        self.data = data;
        self.dirty = true;
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn handle(&self) -> Option<BufferId> {
        self.handle
    }

    /// Floats per vertex.
    pub fn stride(&self) -> usize {
        self.attributes.iter().map(|a| a.size as usize).sum()
    }

    /// Number of whole vertices in the buffer.
    pub fn items(&self) -> usize {
        match self.stride() {
            0 => 0,
            s => self.data.len() / s,
        }
    }

    /// Create the device buffer on first use, wire attribute pointers from
    /// the active program and upload when the data changed.
    pub fn provide(&mut self, device: &mut dyn GraphicsDevice, program: Option<ProgramId>) {
        match self.handle {
            Some(h) => device.bind_buffer(BufferTarget::Array, Some(h)),
            None => {
                let h = device.gen_buffer();
                device.bind_buffer(BufferTarget::Array, Some(h));
                self.handle = Some(h);
                self.dirty = true;
                if let Some(program) = program {
                    self.set_pointers(device, program);
                }
            }
        }
        if self.dirty {
            device.buffer_data(BufferTarget::Array, bytemuck::cast_slice(&self.data), self.usage);
            self.dirty = false;
        }
    }

    fn set_pointers(&self, device: &mut dyn GraphicsDevice, program: ProgramId) {
        let stride = (self.stride() * size_of::<f32>()) as u32;
        let mut offset = 0u32;
        for attr in &self.attributes {
            // Inputs the program does not declare have no location.
            if let Some(loc) = device.attrib_location(program, &attr.name) {
                device.enable_vertex_attrib(loc);
                device.vertex_attrib_pointer(loc, attr.size, stride, offset);
            }
            offset += attr.size * size_of::<f32>() as u32;
        }
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(h) = self.handle.take() {
            device.delete_buffer(h);
        }
        self.dirty = !self.data.is_empty();
    }
}

/// A contiguous range of a geometry drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    pub start: u32,
    pub count: u32,
    pub material_index: usize,
}

/// Vertex buffers, optional `u32` indices and material groups.
#[derive(Debug, Default)]
pub struct Geometry {
    refs: RefCount,
    buffers: Vec<VertexBuffer>,
    groups: Vec<Group>,
    indices: Vec<u32>,
    vertex_array: Option<VertexArrayId>,
    index_buffer: Option<BufferId>,
    indices_dirty: bool,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_buffer(&mut self, buffer: VertexBuffer) -> &mut Self {
        self.buffers.push(buffer);
        self
    }

    pub fn buffers(&self) -> &[VertexBuffer] {
        &self.buffers
    }

    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut VertexBuffer> {
        self.buffers.get_mut(index)
    }

    pub fn add_group(&mut self, start: u32, count: u32, material_index: usize) -> &mut Self {
        self.groups.push(Group {
            start,
            count,
            material_index,
        });
        self
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Result<&Group, ResourceError> {
        self.groups.get(index).ok_or(ResourceError::InvalidGroupIndex {
            index,
            groups: self.groups.len(),
        })
    }

    pub fn set_indices(&mut self, indices: Vec<u32>) {
        self.indices = indices;
        self.indices_dirty = true;
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Vertices in the first buffer.
    pub fn vertex_count(&self) -> usize {
        self.buffers.first().map_or(0, VertexBuffer::items)
    }

    pub fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    /// Bind the vertex array, creating it and its buffers on first use.
    pub fn provide(&mut self, device: &mut dyn GraphicsDevice, program: Option<ProgramId>) {
        let vao = match self.vertex_array {
            Some(vao) => vao,
            None => {
                let vao = device.gen_vertex_array();
                self.vertex_array = Some(vao);
                vao
            }
        };
        device.bind_vertex_array(Some(vao));

        for buffer in &mut self.buffers {
            buffer.provide(device, program);
        }

        if self.is_indexed() {
            let ib = match self.index_buffer {
                Some(ib) => ib,
                None => {
                    let ib = device.gen_buffer();
                    self.index_buffer = Some(ib);
                    self.indices_dirty = true;
                    ib
                }
            };
            device.bind_buffer(BufferTarget::ElementArray, Some(ib));
            if self.indices_dirty {
                device.buffer_data(
                    BufferTarget::ElementArray,
                    bytemuck::cast_slice(&self.indices),
                    BufferUsage::StaticDraw,
                );
                self.indices_dirty = false;
            }
        }
    }
}

impl Resource for Geometry {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn refs_mut(&mut self) -> &mut RefCount {
        &mut self.refs
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(vao) = self.vertex_array.take() {
            device.delete_vertex_array(vao);
        }
        if let Some(ib) = self.index_buffer.take() {
            device.delete_buffer(ib);
        }
        for buffer in &mut self.buffers {
            buffer.release(device);
        }
    }

    fn initialize(&mut self) {
        self.refs = RefCount::default();
        self.indices_dirty = !self.indices.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_device::RecordingDevice;

    fn quad() -> Geometry {
        let mut g = Geometry::new();
        g.add_buffer(VertexBuffer::with_data(
            vec![Attribute::new("VertexPosition", 3)],
            vec![0.0; 12],
        ));
        g.set_indices(vec![0, 1, 2, 0, 2, 3]);
        g.add_group(0, 6, 0);
        g
    }

    #[test]
    fn stride_and_items() {
        let vb = VertexBuffer::with_data(
            vec![Attribute::new("VertexPosition", 3), Attribute::new("VertexColor", 3)],
            vec![0.0; 18],
        );
        assert_eq!(vb.stride(), 6);
        assert_eq!(vb.items(), 3);
    }

    #[test]
    fn provide_is_lazy_and_uploads_once() {
        let mut dev = RecordingDevice::new();
        let mut g = quad();
        g.provide(&mut dev, None);
        g.provide(&mut dev, None);
        // one vbo, one index buffer
        assert_eq!(dev.live_buffers(), 2);
        assert_eq!(dev.live_vertex_arrays(), 1);
        let uploads = dev.log().iter().filter(|l| l.starts_with("buffer_data")).count();
        assert_eq!(uploads, 2);
    }

    #[test]
    fn close_releases_on_last_reference() {
        let mut dev = RecordingDevice::new();
        let mut g = quad();
        g.provide(&mut dev, None);
        g.increment();
        assert!(!g.close(&mut dev));
        assert_eq!(dev.live_buffers(), 2);
        assert!(g.close(&mut dev));
        assert_eq!(dev.live_buffers(), 0);
        assert_eq!(dev.live_vertex_arrays(), 0);
        assert_eq!(dev.invalid_releases(), 0);
    }

    #[test]
    fn release_twice_does_not_double_free() {
        let mut dev = RecordingDevice::new();
        let mut g = quad();
        g.provide(&mut dev, None);
        g.release(&mut dev);
        g.release(&mut dev);
        assert_eq!(dev.released().buffers, 2);
        assert_eq!(dev.invalid_releases(), 0);
    }

    #[test]
    fn group_index_is_validated() {
        let g = quad();
        assert!(g.group(0).is_ok());
        assert_eq!(
            g.group(1),
            Err(ResourceError::InvalidGroupIndex { index: 1, groups: 1 })
        );
    }
}
