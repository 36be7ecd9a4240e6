//! The boundary between the resource context and the graphics API.
//!
//! [`GraphicsDevice`] is the complete set of commands the context issues.
//! It mirrors the shape of `glow::HasContext` (associated handle types,
//! `&self` receivers, `Result<_, String>` for object creation) but speaks the
//! backend-neutral vocabulary of [`crate::types`]. [`GlowDevice`] is the
//! OpenGL implementation.

#[cfg(feature = "glow")]
mod gl;

#[cfg(feature = "glow")]
pub use gl::GlowDevice;

use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::types::{
    Attachment, BufferKind, ElementType, FramebufferStatus, ImageFormat, MagFilter, MinFilter,
    PrimitiveKind, RenderBufferStorage, ShaderStage, UniformValue, Viewport, WrapMode,
};

/// A stateful, handle-based graphics API.
///
/// All commands act on the calling thread's current device state, exactly as
/// the underlying API does: `tex_*` calls affect the texture bound to the
/// active unit, `framebuffer_*` calls the bound framebuffer, and so on.
pub trait GraphicsDevice {
    /// Buffer object handle.
    type Buffer: Copy + Eq + Debug;
    /// Texture object handle.
    type Texture: Copy + Eq + Debug;
    /// Shader object handle.
    type Shader: Copy + Eq + Debug;
    /// Program object handle.
    type Program: Copy + Eq + Debug;
    /// Framebuffer object handle.
    type Framebuffer: Copy + Eq + Debug;
    /// Renderbuffer object handle.
    type Renderbuffer: Copy + Eq + Debug;
    /// Vertex array object handle.
    type VertexArray: Copy + Eq + Debug;
    /// Location of a uniform within a linked program.
    type UniformLocation: Clone + Debug;

    // Queries.

    /// Number of texture units usable across all shader stages.
    fn max_combined_texture_units(&self) -> u32;
    /// Maximum anisotropic filtering level, or `None` without the extension.
    fn max_anisotropy(&self) -> Option<f32>;
    /// Pop the oldest pending error code; `0` means no error.
    fn error_code(&self) -> u32;

    // Global state.

    /// Clear color, depth test and back-face culling applied once at
    /// context creation.
    fn init_state(&self);
    /// Set the viewport rectangle.
    fn viewport(&self, viewport: Viewport);
    /// Clear the color and depth buffers of the bound framebuffer.
    fn clear(&self);
    /// Read a rectangle of the bound framebuffer into `out`.
    fn read_pixels(&self, viewport: Viewport, format: ImageFormat, out: &mut [u8]);

    // Vertex arrays.

    /// Create a vertex array object. Core profiles reject attribute setup
    /// and draws while none is bound.
    fn create_vertex_array(&self) -> std::result::Result<Self::VertexArray, String>;
    /// Bind a vertex array object, or unbind with `None`.
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    /// Delete a vertex array object.
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);

    // Buffers.

    /// Create a buffer object.
    fn create_buffer(&self) -> std::result::Result<Self::Buffer, String>;
    /// Delete a buffer object.
    fn delete_buffer(&self, buffer: Self::Buffer);
    /// Bind a buffer to the binding point for `kind`, or unbind with `None`.
    fn bind_buffer(&self, kind: BufferKind, buffer: Option<Self::Buffer>);
    /// Replace the contents of the buffer bound to `kind`.
    fn buffer_data(&self, kind: BufferKind, data: &[u8]);
    /// Enable the attribute array at `location`.
    fn enable_vertex_attrib_array(&self, location: u32);
    /// Disable the attribute array at `location`.
    fn disable_vertex_attrib_array(&self, location: u32);
    /// Describe the layout of the bound array buffer for `location`.
    fn vertex_attrib_pointer(
        &self,
        location: u32,
        components: usize,
        ty: ElementType,
        stride: usize,
    );

    // Shaders and programs.

    /// Create a shader object for `stage`.
    fn create_shader(&self, stage: ShaderStage) -> std::result::Result<Self::Shader, String>;
    /// Set the source text and compile. Returns the compile status.
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> bool;
    /// The compiler log of `shader`.
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    /// Delete a shader object.
    fn delete_shader(&self, shader: Self::Shader);
    /// Create a program object.
    fn create_program(&self) -> std::result::Result<Self::Program, String>;
    /// Attach a compiled shader to a program.
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    /// Detach a shader from a program.
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    /// Link the program. Returns the link status.
    fn link_program(&self, program: Self::Program) -> bool;
    /// Validate the program against the current state. Returns the status.
    fn validate_program(&self, program: Self::Program) -> bool;
    /// The linker or validator log of `program`.
    fn program_info_log(&self, program: Self::Program) -> String;
    /// Delete a program object.
    fn delete_program(&self, program: Self::Program);
    /// Install a program for subsequent draws.
    fn use_program(&self, program: Option<Self::Program>);
    /// Location of the active attribute `name`.
    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    /// Location of the active uniform `name`.
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    /// Upload a value to a uniform of the program in use.
    fn uniform(&self, location: &Self::UniformLocation, value: UniformValue);

    // Textures.

    /// Create a texture object.
    fn create_texture(&self) -> std::result::Result<Self::Texture, String>;
    /// Delete a texture object.
    fn delete_texture(&self, texture: Self::Texture);
    /// Select the texture unit later texture calls act on.
    fn active_texture(&self, unit: u32);
    /// Bind a 2D texture to the active unit.
    fn bind_texture(&self, texture: Option<Self::Texture>);
    /// Set the bound texture's filters.
    fn texture_filters(&self, min: MinFilter, mag: MagFilter);
    /// Set the bound texture's wrap modes.
    fn texture_wrap(&self, s: WrapMode, t: WrapMode);
    /// Set the bound texture's anisotropic filtering level.
    fn texture_anisotropy(&self, level: f32);
    /// Allocate storage for the bound texture and fill it. `None` leaves the
    /// contents undefined.
    fn tex_image_2d(&self, width: u32, height: u32, format: ImageFormat, pixels: Option<&[u8]>);
    /// Overwrite a region of the bound texture's storage.
    fn tex_sub_image_2d(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: ImageFormat,
        pixels: &[u8],
    );
    /// Read the bound texture's level 0 back, where the API supports it.
    fn read_texture_image(&self, width: u32, height: u32, format: ImageFormat)
        -> Option<Vec<u8>>;

    // Render buffers and framebuffers.

    /// Create a renderbuffer object.
    fn create_renderbuffer(&self) -> std::result::Result<Self::Renderbuffer, String>;
    /// Delete a renderbuffer object.
    fn delete_renderbuffer(&self, renderbuffer: Self::Renderbuffer);
    /// Bind, allocate storage, unbind.
    fn renderbuffer_storage(
        &self,
        renderbuffer: Self::Renderbuffer,
        storage: RenderBufferStorage,
        width: u32,
        height: u32,
    );
    /// Create a framebuffer object.
    fn create_framebuffer(&self) -> std::result::Result<Self::Framebuffer, String>;
    /// Delete a framebuffer object.
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    /// Bind a framebuffer, or the default framebuffer with `None`.
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);
    /// Attach a renderbuffer to the bound framebuffer, or detach with `None`.
    fn framebuffer_renderbuffer(
        &self,
        attachment: Attachment,
        renderbuffer: Option<Self::Renderbuffer>,
    );
    /// Completeness of the bound framebuffer.
    fn framebuffer_status(&self) -> FramebufferStatus;

    // Draws.

    /// Draw `count` vertices starting at `first`.
    fn draw_arrays(&self, primitive: PrimitiveKind, first: usize, count: usize);
    /// Draw `count` `u32` indices from the bound element buffer.
    fn draw_elements(&self, primitive: PrimitiveKind, count: usize);
}

/// Query the device error state when `enabled`, failing on any pending error.
///
/// This is the diagnostic-mode check run after each device call.
///
/// # Errors
///
/// Returns [`Error::DeviceError`] carrying the reported code.
pub fn check_errors<D: GraphicsDevice>(device: &D, enabled: bool) -> Result<()> {
    if !enabled {
        return Ok(());
    }
    match device.error_code() {
        0 => Ok(()),
        code => Err(Error::DeviceError { code }),
    }
}

/// Turn a failed handle creation into an [`Error`].
pub(crate) fn created<T>(result: std::result::Result<T, String>) -> Result<T> {
    result.map_err(Error::ObjectCreation)
}
