//! GPU buffers holding vertex attributes or element indices.

use crate::device::{created, GraphicsDevice};
use crate::error::{Error, Result};
use crate::types::{BufferKind, ElementType};

/// One device buffer with a fixed element layout.
///
/// Attribute binding is a strict pair: [`bind_and_enable`](Self::bind_and_enable)
/// then [`disable`](Self::disable), never nested.
#[derive(Debug)]
pub struct GpuBuffer<D: GraphicsDevice> {
    handle: D::Buffer,
    kind: BufferKind,
    element_type: ElementType,
    component_count: usize,
    /// Bytes between consecutive elements; set by the last upload.
    stride: usize,
    /// Elements in the last upload.
    len: usize,
    bound_location: Option<u32>,
}

impl<D: GraphicsDevice> GpuBuffer<D> {
    /// Create an empty buffer.
    pub(crate) fn new(
        device: &D,
        kind: BufferKind,
        element_type: ElementType,
        component_count: usize,
    ) -> Result<Self> {
        if !(1..=4).contains(&component_count) {
            return Err(Error::InvalidComponentCount(component_count));
        }
        let handle = created(device.create_buffer())?;
        Ok(Self {
            handle,
            kind,
            element_type,
            component_count,
            stride: component_count * element_type.size(),
            len: 0,
            bound_location: None,
        })
    }

    /// Replace the full contents with `data`, `len` elements of `stride`
    /// bytes each.
    pub(crate) fn upload(&mut self, device: &D, data: &[u8], len: usize, stride: usize) {
        device.bind_buffer(self.kind, Some(self.handle));
        device.buffer_data(self.kind, data);
        device.bind_buffer(self.kind, None);
        self.len = len;
        self.stride = stride;
    }

    /// Bind to an attribute location and describe the layout.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyBound`] if the buffer is bound to a location already.
    pub(crate) fn bind_and_enable(&mut self, device: &D, location: u32) -> Result<()> {
        if self.bound_location.is_some() {
            return Err(Error::AlreadyBound);
        }
        self.bound_location = Some(location);
        device.bind_buffer(self.kind, Some(self.handle));
        device.enable_vertex_attrib_array(location);
        device.vertex_attrib_pointer(
            location,
            self.component_count,
            self.element_type,
            self.stride,
        );
        Ok(())
    }

    /// Disable the bound attribute and unbind.
    ///
    /// # Errors
    ///
    /// [`Error::NotBound`] if the buffer is not bound.
    pub(crate) fn disable(&mut self, device: &D) -> Result<()> {
        let location = self.bound_location.take().ok_or(Error::NotBound)?;
        device.disable_vertex_attrib_array(location);
        device.bind_buffer(self.kind, None);
        Ok(())
    }

    /// Bind as the element source of the next indexed draw.
    pub(crate) fn bind_indices(&self, device: &D) {
        device.bind_buffer(BufferKind::Index, Some(self.handle));
    }

    pub(crate) fn unbind_indices(device: &D) {
        device.bind_buffer(BufferKind::Index, None);
    }

    pub(crate) fn destroy(self, device: &D) {
        if let Some(location) = self.bound_location {
            device.disable_vertex_attrib_array(location);
        }
        device.delete_buffer(self.handle);
    }

    /// The device handle.
    pub fn handle(&self) -> D::Buffer {
        self.handle
    }

    /// Array or element-array buffer.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Component type.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Components per element.
    pub fn component_count(&self) -> usize {
        self.component_count
    }

    /// Bytes per element.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Elements in the last upload.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been uploaded (or an empty upload).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Attribute location while bound.
    pub fn bound_location(&self) -> Option<u32> {
        self.bound_location
    }
}
