//! [`GraphicsDevice`] over OpenGL via [glow].
//!
//! [glow]: https://docs.rs/glow

use std::sync::Arc;

use glow::{HasContext, PixelPackData, PixelUnpackData};

use super::GraphicsDevice;
use crate::types::{
    Attachment, BufferKind, ElementType, FramebufferStatus, ImageFormat, InternalFormat,
    MagFilter, MinFilter, PixelFormat, PixelType, PrimitiveKind, RenderBufferStorage,
    ShaderStage, UniformValue, Viewport, WrapMode,
};

const ANISOTROPY_EXTENSION: &str = "GL_EXT_texture_filter_anisotropic";

/// Row alignment of every pixel transfer. Client-side rows are tightly
/// packed, while GL defaults to 4.
const TRANSFER_ALIGNMENT: usize = 1;

/// Convert a `u32` to `i32` for GL API calls.
///
/// # Panics
///
/// Panics if `value > i32::MAX`. In practice, this is unreachable for
/// normal viewport dimensions and image sizes.
fn gl_size(value: u32) -> i32 {
    i32::try_from(value).expect("dimension exceeds i32::MAX")
}

/// Convert a `usize` count to `i32` for GL API calls.
///
/// # Panics
///
/// Panics if `value > i32::MAX`.
fn gl_count(value: usize) -> i32 {
    i32::try_from(value).expect("count exceeds i32::MAX")
}

/// GL enum values are small enough that the cast to `i32` is always safe.
#[expect(clippy::cast_possible_wrap)]
const fn gl_param(value: u32) -> i32 {
    value as i32
}

/// Bytes GL reads or writes for a `width` x `height` transfer whose rows
/// start on `alignment`-byte boundaries.
fn transfer_len(width: u32, height: u32, format: ImageFormat, alignment: usize) -> usize {
    let row = width as usize * format.bytes_per_pixel();
    match height as usize {
        0 => 0,
        rows => row.next_multiple_of(alignment) * (rows - 1) + row,
    }
}

/// Refuse to hand GL a client buffer shorter than the transfer.
///
/// # Panics
///
/// Panics if `len` bytes cannot hold a `width` x `height` image in `format`.
fn check_transfer(len: usize, width: u32, height: u32, format: ImageFormat) {
    let needed = transfer_len(width, height, format, TRANSFER_ALIGNMENT);
    assert!(
        len >= needed,
        "pixel buffer holds {len} bytes, transfer needs {needed}"
    );
}

fn buffer_target(kind: BufferKind) -> u32 {
    match kind {
        BufferKind::Vertex => glow::ARRAY_BUFFER,
        BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn element_type(ty: ElementType) -> u32 {
    match ty {
        ElementType::Byte => glow::BYTE,
        ElementType::UnsignedByte => glow::UNSIGNED_BYTE,
        ElementType::Short => glow::SHORT,
        ElementType::UnsignedShort => glow::UNSIGNED_SHORT,
        ElementType::Int => glow::INT,
        ElementType::UnsignedInt => glow::UNSIGNED_INT,
        ElementType::Float => glow::FLOAT,
    }
}

fn primitive_mode(primitive: PrimitiveKind) -> u32 {
    match primitive {
        PrimitiveKind::Points => glow::POINTS,
        PrimitiveKind::Lines => glow::LINES,
        PrimitiveKind::LineStrip => glow::LINE_STRIP,
        PrimitiveKind::LineLoop => glow::LINE_LOOP,
        PrimitiveKind::Triangles => glow::TRIANGLES,
        PrimitiveKind::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveKind::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn shader_type(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn min_filter(filter: MinFilter) -> u32 {
    match filter {
        MinFilter::Nearest => glow::NEAREST,
        MinFilter::Linear => glow::LINEAR,
        MinFilter::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
        MinFilter::LinearMipmapNearest => glow::LINEAR_MIPMAP_NEAREST,
        MinFilter::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
        MinFilter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }
}

fn mag_filter(filter: MagFilter) -> u32 {
    match filter {
        MagFilter::Nearest => glow::NEAREST,
        MagFilter::Linear => glow::LINEAR,
    }
}

fn wrap_mode(wrap: WrapMode) -> u32 {
    match wrap {
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        WrapMode::Repeat => glow::REPEAT,
        WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
    }
}

fn pixel_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Red => glow::RED,
        PixelFormat::Rgb => glow::RGB,
        PixelFormat::Bgr => glow::BGR,
        PixelFormat::Rgba => glow::RGBA,
        PixelFormat::Bgra => glow::BGRA,
        PixelFormat::DepthComponent => glow::DEPTH_COMPONENT,
    }
}

fn pixel_type(ty: PixelType) -> u32 {
    match ty {
        PixelType::UnsignedByte => glow::UNSIGNED_BYTE,
        PixelType::Float => glow::FLOAT,
    }
}

fn internal_format(format: InternalFormat) -> i32 {
    gl_param(match format {
        InternalFormat::R8 => glow::R8,
        InternalFormat::Rgb8 => glow::RGB8,
        InternalFormat::Rgba8 => glow::RGBA8,
        InternalFormat::Rgba32F => glow::RGBA32F,
        InternalFormat::DepthComponent24 => glow::DEPTH_COMPONENT24,
    })
}

fn renderbuffer_format(storage: RenderBufferStorage) -> u32 {
    match storage {
        RenderBufferStorage::Rgba8 => glow::RGBA8,
        RenderBufferStorage::DepthComponent16 => glow::DEPTH_COMPONENT16,
        RenderBufferStorage::DepthComponent24 => glow::DEPTH_COMPONENT24,
        RenderBufferStorage::Depth24Stencil8 => glow::DEPTH24_STENCIL8,
    }
}

fn attachment_point(attachment: Attachment) -> u32 {
    match attachment {
        Attachment::Color0 => glow::COLOR_ATTACHMENT0,
        Attachment::Depth => glow::DEPTH_ATTACHMENT,
    }
}

/// An OpenGL device.
///
/// # Example
///
/// ```no_run
/// # use glow_resource_context::{Context, ContextConfig, GlowDevice};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) -> glow_resource_context::Result<()> {
/// // With the GL context current on this thread:
/// let device = unsafe { GlowDevice::new(gl) };
/// let mut context = Context::new(device, ContextConfig::default());
/// // ... create resources, draw ...
/// context.dispose();
/// # Ok(())
/// # }
/// ```
pub struct GlowDevice {
    /// The OpenGL context, shared via [`Arc`] so the caller can keep using it
    /// alongside this device.
    gl: Arc<glow::Context>,
    /// Whether `GL_EXT_texture_filter_anisotropic` is available.
    anisotropic: bool,
}

impl GlowDevice {
    /// Wrap a GL context.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current on the calling thread for the whole
    /// lifetime of the returned device, and every method must be called from
    /// that thread. Every trait method issues raw GL calls on the strength of
    /// this promise.
    pub unsafe fn new(gl: Arc<glow::Context>) -> Self {
        let anisotropic = gl.supported_extensions().contains(ANISOTROPY_EXTENSION);
        Self { gl, anisotropic }
    }

    /// The wrapped GL context.
    #[must_use]
    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    // The caller shares the context, so the alignment is reset before every
    // transfer rather than once.

    fn pack_tightly(&self) {
        unsafe {
            self.gl
                .pixel_store_i32(glow::PACK_ALIGNMENT, gl_count(TRANSFER_ALIGNMENT));
        }
    }

    fn unpack_tightly(&self) {
        unsafe {
            self.gl
                .pixel_store_i32(glow::UNPACK_ALIGNMENT, gl_count(TRANSFER_ALIGNMENT));
        }
    }
}

// SAFETY (whole impl): `GlowDevice::new` requires the context to be current
// on this thread for the device's lifetime.
impl GraphicsDevice for GlowDevice {
    type Buffer = glow::Buffer;
    type Texture = glow::Texture;
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Framebuffer = glow::Framebuffer;
    type Renderbuffer = glow::Renderbuffer;
    type VertexArray = glow::VertexArray;
    type UniformLocation = glow::UniformLocation;

    fn max_combined_texture_units(&self) -> u32 {
        let units = unsafe { self.gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS) };
        u32::try_from(units).unwrap_or(0)
    }

    fn max_anisotropy(&self) -> Option<f32> {
        self.anisotropic
            .then(|| unsafe { self.gl.get_parameter_f32(glow::MAX_TEXTURE_MAX_ANISOTROPY_EXT) })
    }

    fn error_code(&self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn init_state(&self) {
        unsafe {
            self.gl.clear_color(0.0, 0.0, 0.0, 0.0);
            self.gl.enable(glow::DEPTH_TEST);
            self.gl.enable(glow::CULL_FACE);
        }
    }

    fn viewport(&self, viewport: Viewport) {
        unsafe {
            self.gl
                .viewport(viewport.x, viewport.y, viewport.width, viewport.height);
        }
    }

    fn clear(&self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT) };
    }

    fn read_pixels(&self, viewport: Viewport, format: ImageFormat, out: &mut [u8]) {
        check_transfer(
            out.len(),
            u32::try_from(viewport.width).unwrap_or(0),
            u32::try_from(viewport.height).unwrap_or(0),
            format,
        );
        unsafe {
            self.pack_tightly();
            self.gl.read_pixels(
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                pixel_format(format.format),
                pixel_type(format.ty),
                PixelPackData::Slice(Some(out)),
            );
        }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        unsafe { self.gl.create_vertex_array() }
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vertex_array) };
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vertex_array) };
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) };
    }

    fn bind_buffer(&self, kind: BufferKind, buffer: Option<Self::Buffer>) {
        unsafe { self.gl.bind_buffer(buffer_target(kind), buffer) };
    }

    fn buffer_data(&self, kind: BufferKind, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(buffer_target(kind), data, glow::STATIC_DRAW);
        }
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(location) };
    }

    fn disable_vertex_attrib_array(&self, location: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(location) };
    }

    fn vertex_attrib_pointer(
        &self,
        location: u32,
        components: usize,
        ty: ElementType,
        stride: usize,
    ) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                location,
                gl_count(components),
                element_type(ty),
                false,
                gl_count(stride),
                0,
            );
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        unsafe { self.gl.create_shader(shader_type(stage)) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> bool {
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            self.gl.get_shader_compile_status(shader)
        }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) };
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.attach_shader(program, shader) };
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.detach_shader(program, shader) };
    }

    fn link_program(&self, program: Self::Program) -> bool {
        unsafe {
            self.gl.link_program(program);
            self.gl.get_program_link_status(program)
        }
    }

    fn validate_program(&self, program: Self::Program) -> bool {
        unsafe {
            self.gl.validate_program(program);
            self.gl
                .get_program_parameter_i32(program, glow::VALIDATE_STATUS)
                != 0
        }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) };
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) };
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn uniform(&self, location: &Self::UniformLocation, value: UniformValue) {
        let gl = &self.gl;
        let location = Some(location);
        unsafe {
            match value {
                UniformValue::Int(v) => gl.uniform_1_i32(location, v),
                UniformValue::Float(v) => gl.uniform_1_f32(location, v),
                UniformValue::Vec2([x, y]) => gl.uniform_2_f32(location, x, y),
                UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(location, x, y, z),
                UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(location, x, y, z, w),
                UniformValue::Mat3(m) => gl.uniform_matrix_3_f32_slice(location, false, &m),
                UniformValue::Mat4(m) => gl.uniform_matrix_4_f32_slice(location, false, &m),
            }
        }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { self.gl.create_texture() }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&self, texture: Option<Self::Texture>) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture) };
    }

    fn texture_filters(&self, min: MinFilter, mag: MagFilter) {
        unsafe {
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                gl_param(min_filter(min)),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                gl_param(mag_filter(mag)),
            );
        }
    }

    fn texture_wrap(&self, s: WrapMode, t: WrapMode) {
        unsafe {
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                gl_param(wrap_mode(s)),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                gl_param(wrap_mode(t)),
            );
        }
    }

    fn texture_anisotropy(&self, level: f32) {
        if self.anisotropic {
            unsafe {
                self.gl.tex_parameter_f32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MAX_ANISOTROPY_EXT,
                    level,
                );
            }
        }
    }

    fn tex_image_2d(&self, width: u32, height: u32, format: ImageFormat, pixels: Option<&[u8]>) {
        if let Some(pixels) = pixels {
            check_transfer(pixels.len(), width, height, format);
        }
        unsafe {
            self.unpack_tightly();
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format(format.internal),
                gl_size(width),
                gl_size(height),
                0,
                pixel_format(format.format),
                pixel_type(format.ty),
                PixelUnpackData::Slice(pixels),
            );
        }
    }

    fn tex_sub_image_2d(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: ImageFormat,
        pixels: &[u8],
    ) {
        check_transfer(pixels.len(), width, height, format);
        unsafe {
            self.unpack_tightly();
            self.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_size(x),
                gl_size(y),
                gl_size(width),
                gl_size(height),
                pixel_format(format.format),
                pixel_type(format.ty),
                PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn read_texture_image(&self, width: u32, height: u32, format: ImageFormat) -> Option<Vec<u8>> {
        let mut pixels = vec![0; format.byte_len(width, height)];
        unsafe {
            self.pack_tightly();
            self.gl.get_tex_image(
                glow::TEXTURE_2D,
                0,
                pixel_format(format.format),
                pixel_type(format.ty),
                PixelPackData::Slice(Some(&mut pixels)),
            );
        }
        Some(pixels)
    }

    // WebGL has no texture readback.
    #[cfg(target_arch = "wasm32")]
    fn read_texture_image(&self, _: u32, _: u32, _: ImageFormat) -> Option<Vec<u8>> {
        None
    }

    fn create_renderbuffer(&self) -> Result<Self::Renderbuffer, String> {
        unsafe { self.gl.create_renderbuffer() }
    }

    fn delete_renderbuffer(&self, renderbuffer: Self::Renderbuffer) {
        unsafe { self.gl.delete_renderbuffer(renderbuffer) };
    }

    fn renderbuffer_storage(
        &self,
        renderbuffer: Self::Renderbuffer,
        storage: RenderBufferStorage,
        width: u32,
        height: u32,
    ) {
        unsafe {
            self.gl
                .bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            self.gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                renderbuffer_format(storage),
                gl_size(width),
                gl_size(height),
            );
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String> {
        unsafe { self.gl.create_framebuffer() }
    }

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        unsafe { self.gl.delete_framebuffer(framebuffer) };
    }

    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) };
    }

    fn framebuffer_renderbuffer(
        &self,
        attachment: Attachment,
        renderbuffer: Option<Self::Renderbuffer>,
    ) {
        unsafe {
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                attachment_point(attachment),
                glow::RENDERBUFFER,
                renderbuffer,
            );
        }
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        match unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) } {
            glow::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
            status => FramebufferStatus::Incomplete(status),
        }
    }

    fn draw_arrays(&self, primitive: PrimitiveKind, first: usize, count: usize) {
        unsafe {
            self.gl
                .draw_arrays(primitive_mode(primitive), gl_count(first), gl_count(count));
        }
    }

    fn draw_elements(&self, primitive: PrimitiveKind, count: usize) {
        unsafe {
            self.gl.draw_elements(
                primitive_mode(primitive),
                gl_count(count),
                glow::UNSIGNED_INT,
                0,
            );
        }
    }
}
