//! The resource context: one device session and every resource created in
//! it.

use std::path::Path;

use crate::buffer::GpuBuffer;
use crate::device::{check_errors, created, GraphicsDevice};
use crate::error::{Error, Result};
use crate::program::ShaderProgram;
use crate::registry::{
    next_owner, BufferId, ProgramId, Registry, RenderBufferId, RenderTargetId, ResourceKey, Table,
    TextureId,
};
use crate::target::{RenderBuffer, RenderTarget};
use crate::texture::Texture;
use crate::types::{
    BufferKind, ElementType, ImageData, ImageFormat, RenderBufferStorage, TextureParams, Viewport,
};
use crate::viewport::ViewportStack;

/// Settings fixed at context creation.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ContextConfig {
    /// Query the device error state after every state-changing call and
    /// fail with [`Error::DeviceError`] on the first error.
    pub debug_checks: bool,
    /// Anisotropy for textures that do not choose their own. Clamped to the
    /// device maximum; `None` uses the maximum.
    pub default_anisotropy: Option<f32>,
}

impl ContextConfig {
    /// Default settings with device error checks enabled.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            debug_checks: true,
            ..Self::default()
        }
    }
}

/// Owns a [`GraphicsDevice`] and every resource created through it.
///
/// Resources are handed out as `Copy` ids. Each one is recorded in a
/// disposal registry when created; [`dispose`](Self::dispose), or dropping
/// the context, destroys whatever is still alive in reverse creation order.
pub struct Context<D: GraphicsDevice> {
    pub(crate) device: D,
    pub(crate) config: ContextConfig,
    free_units: Vec<u32>,
    viewports: ViewportStack,
    registry: Registry,
    pub(crate) buffers: Table<BufferId, GpuBuffer<D>>,
    pub(crate) textures: Table<TextureId, Texture<D>>,
    pub(crate) programs: Table<ProgramId, ShaderProgram<D>>,
    render_buffers: Table<RenderBufferId, RenderBuffer<D>>,
    targets: Table<RenderTargetId, RenderTarget<D>>,
    vertex_array: Option<D::VertexArray>,
    max_anisotropy: Option<f32>,
    default_anisotropy: Option<f32>,
    disposed: bool,
}

impl<D: GraphicsDevice> Context<D> {
    /// Take over `device` and apply the initial pipeline state: clear color
    /// `(0, 0, 0, 0)`, depth test and back-face culling enabled.
    ///
    /// A single vertex array object is created and stays bound until
    /// [`dispose`](Self::dispose), since core profiles draw nothing without
    /// one. Devices that cannot create one draw without it.
    pub fn new(device: D, config: ContextConfig) -> Self {
        let units = device.max_combined_texture_units();
        let max_anisotropy = device.max_anisotropy();
        let default_anisotropy = max_anisotropy.map(|max| {
            config
                .default_anisotropy
                .map_or(max, |level| level.min(max))
        });
        device.init_state();
        let vertex_array = match created(device.create_vertex_array()) {
            Ok(vertex_array) => {
                device.bind_vertex_array(Some(vertex_array));
                Some(vertex_array)
            }
            Err(e) => {
                log::warn!("drawing without a vertex array object: {e}");
                None
            }
        };
        let owner = next_owner();
        log::debug!(
            "context created with {units} texture units, max anisotropy {max_anisotropy:?}"
        );

        Self {
            device,
            config,
            // Popped from the back, so unit 0 goes first.
            free_units: (0..units).rev().collect(),
            viewports: ViewportStack::new(),
            registry: Registry::default(),
            buffers: Table::new(owner),
            textures: Table::new(owner),
            programs: Table::new(owner),
            render_buffers: Table::new(owner),
            targets: Table::new(owner),
            vertex_array,
            max_anisotropy,
            default_anisotropy,
            disposed: false,
        }
    }

    /// The device this context drives.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Settings the context was created with.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }

    // Buffers.

    /// Create an empty vertex buffer of `component_count` components of
    /// `element_type` per vertex.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidComponentCount`] outside `1..=4`.
    pub fn create_vertex_buffer(
        &mut self,
        element_type: ElementType,
        component_count: usize,
    ) -> Result<BufferId> {
        self.create_buffer(BufferKind::Vertex, element_type, component_count)
    }

    /// Create an empty buffer of `u32` indices.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot create the buffer.
    pub fn create_index_buffer(&mut self) -> Result<BufferId> {
        self.create_buffer(BufferKind::Index, ElementType::UnsignedInt, 1)
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        element_type: ElementType,
        component_count: usize,
    ) -> Result<BufferId> {
        self.ensure_live()?;
        let buffer = GpuBuffer::new(&self.device, kind, element_type, component_count)?;
        if let Err(e) = self.check_for_errors_if_debugging() {
            buffer.destroy(&self.device);
            return Err(e);
        }
        let id: BufferId = self.buffers.insert(buffer);
        self.registry.register(id);
        Ok(id)
    }

    /// Replace the contents of a vertex buffer. Each `T` is one vertex and
    /// must be at least as large as the buffer's layout; a larger `T` leaves
    /// its trailing bytes unread.
    ///
    /// # Errors
    ///
    /// [`Error::WrongBufferKind`] for an index buffer,
    /// [`Error::VertexLayoutMismatch`] if `T` is smaller than one vertex.
    pub fn upload_vertices<T: bytemuck::Pod>(&mut self, id: BufferId, data: &[T]) -> Result<()> {
        self.upload(id, BufferKind::Vertex, bytemuck::cast_slice(data), data.len(), size_of::<T>())
    }

    /// Replace the contents of an index buffer.
    ///
    /// # Errors
    ///
    /// [`Error::WrongBufferKind`] for a vertex buffer.
    pub fn upload_indices(&mut self, id: BufferId, indices: &[u32]) -> Result<()> {
        self.upload(
            id,
            BufferKind::Index,
            bytemuck::cast_slice(indices),
            indices.len(),
            size_of::<u32>(),
        )
    }

    fn upload(
        &mut self,
        id: BufferId,
        kind: BufferKind,
        bytes: &[u8],
        len: usize,
        stride: usize,
    ) -> Result<()> {
        let buffer = self.buffers.get_mut(id)?;
        if buffer.kind() != kind {
            return Err(Error::WrongBufferKind);
        }
        let vertex_size = buffer.component_count() * buffer.element_type().size();
        if stride < vertex_size {
            return Err(Error::VertexLayoutMismatch {
                expected: vertex_size,
                found: stride,
            });
        }
        buffer.upload(&self.device, bytes, len, stride);
        self.check_for_errors_if_debugging()
    }

    /// A buffer's description.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] or [`Error::UnknownResource`].
    pub fn buffer(&self, id: BufferId) -> Result<&GpuBuffer<D>> {
        self.buffers.get(id)
    }

    // Textures.

    /// Create a texture on a free texture unit.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceExhausted`] when every unit is taken.
    pub fn create_texture(&mut self, params: TextureParams) -> Result<TextureId> {
        self.ensure_live()?;
        let unit = self.free_units.pop().ok_or(Error::ResourceExhausted)?;
        let params = TextureParams {
            anisotropy: self.resolve_anisotropy(params.anisotropy),
            ..params
        };
        let texture = match Texture::new(&self.device, unit, params) {
            Ok(texture) => texture,
            Err(e) => {
                self.free_units.push(unit);
                return Err(e);
            }
        };
        if let Err(e) = self.check_for_errors_if_debugging() {
            self.free_units.push(texture.destroy(&self.device));
            return Err(e);
        }
        let id: TextureId = self.textures.insert(texture);
        self.registry.register(id);
        log::trace!("texture {} created on unit {unit}", id.index());
        Ok(id)
    }

    /// Create a texture with zero-filled storage of the given size.
    ///
    /// # Errors
    ///
    /// As [`create_texture`](Self::create_texture).
    pub fn create_empty_texture(
        &mut self,
        params: TextureParams,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<TextureId> {
        let id = self.create_texture(params)?;
        self.textures
            .get_mut(id)?
            .allocate(&self.device, width, height, format);
        self.check_for_errors_if_debugging()
            .inspect_err(|_| self.discard(id))?;
        Ok(id)
    }

    /// Decode an encoded image (PNG or JPEG) and upload it as RGBA into a
    /// new texture.
    ///
    /// # Errors
    ///
    /// [`Error::Image`] if decoding fails, otherwise as
    /// [`create_texture`](Self::create_texture).
    pub fn load_texture_from_memory(
        &mut self,
        params: TextureParams,
        bytes: &[u8],
    ) -> Result<TextureId> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let id = self.create_texture(params)?;
        self.upload_rgba_image(id, &image)
            .inspect_err(|_| self.discard(id))?;
        Ok(id)
    }

    /// Replace a texture's full image.
    ///
    /// # Errors
    ///
    /// [`Error::ImageSizeMismatch`] if the pixels do not match the declared
    /// size.
    pub fn upload_image(&mut self, id: TextureId, image: &ImageData<'_>) -> Result<()> {
        self.textures
            .get_mut(id)?
            .upload_image(&self.device, image)?;
        self.check_for_errors_if_debugging()
    }

    /// Replace a texture's full image with a decoded RGBA bitmap.
    ///
    /// # Errors
    ///
    /// As [`upload_image`](Self::upload_image).
    pub fn upload_rgba_image(&mut self, id: TextureId, image: &image::RgbaImage) -> Result<()> {
        self.upload_image(
            id,
            &ImageData {
                width: image.width(),
                height: image.height(),
                format: ImageFormat::RGBA8,
                pixels: image.as_raw(),
            },
        )
    }

    /// Overwrite a region of a texture in the format of its last full
    /// upload.
    ///
    /// # Errors
    ///
    /// [`Error::NoImageStorage`] before a full upload,
    /// [`Error::RegionOutOfBounds`] for a region outside the image.
    pub fn upload_sub_image(
        &mut self,
        id: TextureId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        self.textures
            .get_mut(id)?
            .upload_sub_image(&self.device, x, y, width, height, pixels)?;
        self.check_for_errors_if_debugging()
    }

    /// Read a texture's full image back. `Ok(None)` where the device cannot
    /// read textures (WebGL).
    ///
    /// # Errors
    ///
    /// [`Error::NoImageStorage`] before any upload.
    pub fn read_image(&self, id: TextureId) -> Result<Option<Vec<u8>>> {
        let pixels = self.textures.get(id)?.read_image(&self.device)?;
        self.check_for_errors_if_debugging()?;
        Ok(pixels)
    }

    /// A texture's description.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] or [`Error::UnknownResource`].
    pub fn texture(&self, id: TextureId) -> Result<&Texture<D>> {
        self.textures.get(id)
    }

    fn resolve_anisotropy(&self, requested: Option<f32>) -> Option<f32> {
        let max = self.max_anisotropy?;
        requested
            .map(|level| level.min(max))
            .or(self.default_anisotropy)
    }

    // Programs.

    /// Compile, link, and validate a program.
    ///
    /// # Errors
    ///
    /// [`Error::CompileError`] or [`Error::LinkError`] with the driver log.
    pub fn create_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId> {
        self.ensure_live()?;
        let program = ShaderProgram::new(&self.device, vertex_src, fragment_src)?;
        if let Err(e) = self.check_for_errors_if_debugging() {
            program.destroy(&self.device);
            return Err(e);
        }
        let id: ProgramId = self.programs.insert(program);
        self.registry.register(id);
        Ok(id)
    }

    /// A program's description.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] or [`Error::UnknownResource`].
    pub fn program(&self, id: ProgramId) -> Result<&ShaderProgram<D>> {
        self.programs.get(id)
    }

    /// Read both shader sources from disk and
    /// [`create_program`](Self::create_program).
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if either file cannot be read.
    pub fn create_program_from_files(
        &mut self,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<ProgramId> {
        let vertex_src = std::fs::read_to_string(vertex_path)?;
        let fragment_src = std::fs::read_to_string(fragment_path)?;
        self.create_program(&vertex_src, &fragment_src)
    }

    // Render buffers and targets.

    /// Create a render buffer of fixed size and storage.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot create the render buffer.
    pub fn create_render_buffer(
        &mut self,
        width: u32,
        height: u32,
        storage: RenderBufferStorage,
    ) -> Result<RenderBufferId> {
        self.ensure_live()?;
        let render_buffer = RenderBuffer::new(&self.device, width, height, storage)?;
        if let Err(e) = self.check_for_errors_if_debugging() {
            render_buffer.destroy(&self.device);
            return Err(e);
        }
        let id: RenderBufferId = self.render_buffers.insert(render_buffer);
        self.registry.register(id);
        Ok(id)
    }

    /// A render buffer's description.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] or [`Error::UnknownResource`].
    pub fn render_buffer(&self, id: RenderBufferId) -> Result<&RenderBuffer<D>> {
        self.render_buffers.get(id)
    }

    /// Build a render target over two existing render buffers. The caller
    /// keeps ownership of the buffers.
    ///
    /// # Errors
    ///
    /// [`Error::IncompleteTarget`] if the device rejects the combination.
    pub fn create_render_target(
        &mut self,
        color: RenderBufferId,
        depth: RenderBufferId,
    ) -> Result<RenderTargetId> {
        self.create_target(color, depth, false)
    }

    /// Create a color and a depth render buffer and a target that owns
    /// them: disposing the target disposes both.
    ///
    /// # Errors
    ///
    /// [`Error::IncompleteTarget`] if the device rejects the combination, in
    /// which case both render buffers are disposed again.
    pub fn create_owned_render_target(
        &mut self,
        width: u32,
        height: u32,
        color_storage: RenderBufferStorage,
        depth_storage: RenderBufferStorage,
    ) -> Result<RenderTargetId> {
        let color = self.create_render_buffer(width, height, color_storage)?;
        let depth = self
            .create_render_buffer(width, height, depth_storage)
            .inspect_err(|_| self.discard(color))?;
        self.create_target(color, depth, true).inspect_err(|_| {
            self.discard(depth);
            self.discard(color);
        })
    }

    fn create_target(
        &mut self,
        color: RenderBufferId,
        depth: RenderBufferId,
        owns_attachments: bool,
    ) -> Result<RenderTargetId> {
        self.ensure_live()?;
        let target = RenderTarget::new(
            &self.device,
            (color, self.render_buffers.get(color)?),
            (depth, self.render_buffers.get(depth)?),
            owns_attachments,
        )?;
        if let Err(e) = self.check_for_errors_if_debugging() {
            // Owned attachments are released by the caller.
            let _ = target.destroy(&self.device);
            return Err(e);
        }
        let id: RenderTargetId = self.targets.insert(target);
        self.registry.register(id);
        Ok(id)
    }

    /// A render target's description.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] or [`Error::UnknownResource`].
    pub fn render_target(&self, id: RenderTargetId) -> Result<&RenderTarget<D>> {
        self.targets.get(id)
    }

    /// Redirect drawing into a render target and cover it with the
    /// viewport.
    ///
    /// # Errors
    ///
    /// [`Error::TargetAlreadyActive`] if the target is active.
    pub fn activate_target(&mut self, id: RenderTargetId) -> Result<()> {
        self.targets
            .get_mut(id)?
            .activate(&self.device, &mut self.viewports)?;
        self.check_for_errors_if_debugging()
    }

    /// Return to the default framebuffer and the previous viewport.
    ///
    /// # Errors
    ///
    /// [`Error::TargetNotActive`] if the target is not active.
    pub fn deactivate_target(&mut self, id: RenderTargetId) -> Result<()> {
        self.targets
            .get_mut(id)?
            .deactivate(&self.device, &mut self.viewports)?;
        self.check_for_errors_if_debugging()
    }

    // Global state.

    /// Save the current viewport. Issues no device call.
    pub fn push_viewport(&mut self) {
        self.viewports.push();
    }

    /// Replace the current viewport and apply it.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewports.set(&self.device, viewport);
    }

    /// Restore the viewport saved by the matching
    /// [`push_viewport`](Self::push_viewport).
    ///
    /// # Errors
    ///
    /// [`Error::ViewportUnderflow`] without a matching push.
    pub fn pop_viewport(&mut self) -> Result<()> {
        self.viewports.pop(&self.device)
    }

    /// The current viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewports.top()
    }

    /// Clear the color and depth buffers.
    pub fn clear(&self) {
        self.device.clear();
    }

    /// Read a rectangle of the bound framebuffer.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceError`] in debug mode.
    pub fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<Vec<u8>> {
        let mut pixels = vec![0; format.byte_len(width, height)];
        self.device
            .read_pixels(Viewport::sized(x, y, width, height), format, &mut pixels);
        self.check_for_errors_if_debugging()?;
        Ok(pixels)
    }

    /// Fail on any pending device error.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceError`] with the reported code.
    pub fn check_for_errors(&self) -> Result<()> {
        check_errors(&self.device, true)
    }

    /// [`check_for_errors`](Self::check_for_errors) when debug checks are
    /// enabled; a no-op otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceError`] with the reported code.
    pub fn check_for_errors_if_debugging(&self) -> Result<()> {
        check_errors(&self.device, self.config.debug_checks)
    }

    // Anisotropy.

    /// The device's maximum anisotropy, or `None` without the extension.
    pub fn max_anisotropy(&self) -> Option<f32> {
        self.max_anisotropy
    }

    /// Anisotropy applied to textures that do not choose their own.
    pub fn default_anisotropy(&self) -> Option<f32> {
        self.default_anisotropy
    }

    /// Change the default anisotropy for textures created from now on.
    /// Clamped to the device maximum; ignored without the extension.
    pub fn set_default_anisotropy(&mut self, level: f32) {
        match self.max_anisotropy {
            Some(max) => self.default_anisotropy = Some(level.min(max)),
            None => log::debug!("anisotropic filtering unsupported, ignoring level {level}"),
        }
    }

    // Introspection.

    /// Texture units not held by a live texture, next to be allocated last.
    pub fn free_texture_units(&self) -> &[u32] {
        &self.free_units
    }

    /// Number of resources not yet disposed.
    pub fn live_resources(&self) -> usize {
        self.buffers.live()
            + self.textures.live()
            + self.programs.live()
            + self.render_buffers.live()
            + self.targets.live()
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // Disposal.

    /// Dispose a single resource now. Disposing it again is a no-op.
    ///
    /// An active render target is deactivated first; a target that owns its
    /// attachments disposes them too.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResource`] for an id this context never issued.
    pub fn dispose_resource(&mut self, key: impl Into<ResourceKey>) -> Result<()> {
        let key = key.into();
        let disposed = match key {
            ResourceKey::Buffer(id) => self
                .buffers
                .take(id)?
                .map(|buffer| buffer.destroy(&self.device))
                .is_some(),
            ResourceKey::Texture(id) => match self.textures.take(id)? {
                Some(texture) => {
                    self.free_units.push(texture.destroy(&self.device));
                    true
                }
                None => false,
            },
            ResourceKey::Program(id) => self
                .programs
                .take(id)?
                .map(|program| program.destroy(&self.device))
                .is_some(),
            ResourceKey::RenderBuffer(id) => self
                .render_buffers
                .take(id)?
                .map(|render_buffer| render_buffer.destroy(&self.device))
                .is_some(),
            ResourceKey::RenderTarget(id) => self.dispose_target(id)?,
        };
        if disposed {
            log::trace!("disposed {key:?}");
        }
        Ok(())
    }

    /// Dispose a resource whose creation is being rolled back.
    pub(crate) fn discard(&mut self, key: impl Into<ResourceKey>) {
        let key = key.into();
        if let Err(e) = self.dispose_resource(key) {
            log::warn!("failed to roll back {key:?}: {e}");
        }
    }

    fn dispose_target(&mut self, id: RenderTargetId) -> Result<bool> {
        let Some(mut target) = self.targets.take(id)? else {
            return Ok(false);
        };
        if target.is_active() {
            if let Err(e) = target.deactivate(&self.device, &mut self.viewports) {
                log::warn!("failed to deactivate render target {}: {e}", id.index());
            }
        }
        if let Some(attachments) = target.destroy(&self.device) {
            for attachment in attachments {
                self.dispose_resource(attachment)?;
            }
        }
        Ok(true)
    }

    /// Dispose a buffer. See [`dispose_resource`](Self::dispose_resource).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResource`] for a foreign id.
    pub fn dispose_buffer(&mut self, id: BufferId) -> Result<()> {
        self.dispose_resource(id)
    }

    /// Dispose a texture and return its unit to the pool.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResource`] for a foreign id.
    pub fn dispose_texture(&mut self, id: TextureId) -> Result<()> {
        self.dispose_resource(id)
    }

    /// Dispose a program and its shaders.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResource`] for a foreign id.
    pub fn dispose_program(&mut self, id: ProgramId) -> Result<()> {
        self.dispose_resource(id)
    }

    /// Dispose a render buffer.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResource`] for a foreign id.
    pub fn dispose_render_buffer(&mut self, id: RenderBufferId) -> Result<()> {
        self.dispose_resource(id)
    }

    /// Dispose a render target. See
    /// [`dispose_resource`](Self::dispose_resource).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownResource`] for a foreign id.
    pub fn dispose_render_target(&mut self, id: RenderTargetId) -> Result<()> {
        self.dispose_resource(id)
    }

    /// Dispose every live resource, newest first. Idempotent; creation
    /// fails with [`Error::Disposed`] afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        log::debug!(
            "disposing context with {} registered resources",
            self.registry.len()
        );
        let keys: Vec<ResourceKey> = self.registry.drain_reverse().collect();
        for key in keys {
            if let Err(e) = self.dispose_resource(key) {
                log::warn!("failed to dispose {key:?}: {e}");
            }
        }
        if let Some(vertex_array) = self.vertex_array.take() {
            self.device.bind_vertex_array(None);
            self.device.delete_vertex_array(vertex_array);
        }
    }
}

impl<D: GraphicsDevice> Drop for Context<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}
