//! An in-memory [`GraphicsDevice`] that records every command.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::device::GraphicsDevice;
use crate::types::{
    Attachment, BufferKind, ElementType, FramebufferStatus, ImageFormat, MagFilter, MinFilter,
    PrimitiveKind, RenderBufferStorage, ShaderStage, UniformValue, Viewport, WrapMode,
};

/// Route `log` output through the test harness. Safe to call repeatedly.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One state-changing device call. Queries are not recorded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    InitState,
    Viewport(Viewport),
    Clear,
    ReadPixels(Viewport),
    CreateVertexArray(u32),
    BindVertexArray(Option<u32>),
    DeleteVertexArray(u32),
    CreateBuffer(u32),
    DeleteBuffer(u32),
    BindBuffer(BufferKind, Option<u32>),
    BufferData(BufferKind, usize),
    EnableAttribute(u32),
    DisableAttribute(u32),
    AttributePointer {
        location: u32,
        components: usize,
        ty: ElementType,
        stride: usize,
    },
    CreateShader(ShaderStage, u32),
    DeleteShader(u32),
    CreateProgram(u32),
    AttachShader(u32, u32),
    DetachShader(u32, u32),
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    Uniform(String, UniformValue),
    CreateTexture(u32),
    DeleteTexture(u32),
    ActiveTexture(u32),
    BindTexture(Option<u32>),
    TextureFilters(MinFilter, MagFilter),
    TextureWrap(WrapMode, WrapMode),
    TextureAnisotropy(f32),
    TexImage {
        width: u32,
        height: u32,
    },
    TexSubImage {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    CreateRenderbuffer(u32),
    DeleteRenderbuffer(u32),
    RenderbufferStorage(u32, RenderBufferStorage),
    CreateFramebuffer(u32),
    DeleteFramebuffer(u32),
    BindFramebuffer(Option<u32>),
    FramebufferRenderbuffer(Attachment, Option<u32>),
    DrawArrays(PrimitiveKind, usize, usize),
    DrawElements(PrimitiveKind, usize),
}

impl Command {
    /// The handle deleted by this command, if it deletes one.
    pub(crate) fn deleted(&self) -> Option<u32> {
        match *self {
            Command::DeleteVertexArray(h)
            | Command::DeleteBuffer(h)
            | Command::DeleteShader(h)
            | Command::DeleteProgram(h)
            | Command::DeleteTexture(h)
            | Command::DeleteRenderbuffer(h)
            | Command::DeleteFramebuffer(h) => Some(h),
            _ => None,
        }
    }
}

/// A texture's level 0 image.
#[derive(Debug, Clone)]
struct Image {
    width: u32,
    bytes_per_pixel: usize,
    pixels: Vec<u8>,
}

/// `GL_INVALID_OPERATION`.
const INVALID_OPERATION: u32 = 0x0502;

/// Records commands and tracks just enough state to answer queries.
///
/// Every handle is a distinct `u32` starting at 1, shared across object
/// kinds, so creation order can be read off the handles. Like a core
/// profile, attribute setup and draws without a bound vertex array raise
/// `GL_INVALID_OPERATION`.
#[derive(Debug)]
pub(crate) struct RecordingDevice {
    texture_units: u32,
    anisotropy: Option<f32>,
    attributes: HashMap<String, u32>,
    uniforms: HashSet<String>,
    failing_compile: Option<ShaderStage>,
    failing_link: bool,
    failing_validate: bool,
    framebuffer_status: FramebufferStatus,
    draw_error: Option<u32>,

    commands: RefCell<Vec<Command>>,
    next_handle: Cell<u32>,
    live: RefCell<BTreeSet<u32>>,
    vertex_arrays: RefCell<BTreeSet<u32>>,
    bound_vertex_array: Cell<Option<u32>>,
    shader_stages: RefCell<HashMap<u32, ShaderStage>>,
    pending_error: Cell<u32>,
    location_queries: Cell<usize>,
    enabled: RefCell<BTreeSet<u32>>,
    active_unit: Cell<u32>,
    bound_textures: RefCell<HashMap<u32, u32>>,
    images: RefCell<HashMap<u32, Image>>,
}

impl RecordingDevice {
    /// Eight texture units, anisotropy up to 16, no attributes or uniforms.
    pub(crate) fn new() -> Self {
        init_logging();
        Self {
            texture_units: 8,
            anisotropy: Some(16.0),
            attributes: HashMap::new(),
            uniforms: HashSet::new(),
            failing_compile: None,
            failing_link: false,
            failing_validate: false,
            framebuffer_status: FramebufferStatus::Complete,
            draw_error: None,
            commands: RefCell::default(),
            next_handle: Cell::new(1),
            live: RefCell::default(),
            vertex_arrays: RefCell::default(),
            bound_vertex_array: Cell::new(None),
            shader_stages: RefCell::default(),
            pending_error: Cell::new(0),
            location_queries: Cell::new(0),
            enabled: RefCell::default(),
            active_unit: Cell::new(0),
            bound_textures: RefCell::default(),
            images: RefCell::default(),
        }
    }

    pub(crate) fn with_texture_units(mut self, units: u32) -> Self {
        self.texture_units = units;
        self
    }

    pub(crate) fn with_anisotropy(mut self, max: Option<f32>) -> Self {
        self.anisotropy = max;
        self
    }

    /// Declare an attribute every program reports at `location`.
    pub(crate) fn with_attribute(mut self, name: &str, location: u32) -> Self {
        self.attributes.insert(name.to_owned(), location);
        self
    }

    /// Declare a uniform every program reports.
    pub(crate) fn with_uniform(mut self, name: &str) -> Self {
        self.uniforms.insert(name.to_owned());
        self
    }

    pub(crate) fn failing_compile(mut self, stage: ShaderStage) -> Self {
        self.failing_compile = Some(stage);
        self
    }

    pub(crate) fn failing_link(mut self) -> Self {
        self.failing_link = true;
        self
    }

    pub(crate) fn failing_validate(mut self) -> Self {
        self.failing_validate = true;
        self
    }

    pub(crate) fn with_framebuffer_status(mut self, status: FramebufferStatus) -> Self {
        self.framebuffer_status = status;
        self
    }

    /// Raise `code` whenever a draw command is issued.
    pub(crate) fn failing_draws(mut self, code: u32) -> Self {
        self.draw_error = Some(code);
        self
    }

    /// Make the next error query report `code`.
    pub(crate) fn inject_error(&self, code: u32) {
        self.pending_error.set(code);
    }

    pub(crate) fn commands(&self) -> Vec<Command> {
        self.commands.borrow().clone()
    }

    pub(crate) fn clear_commands(&self) {
        self.commands.borrow_mut().clear();
    }

    /// Handles in deletion order.
    pub(crate) fn deletions(&self) -> Vec<u32> {
        self.commands
            .borrow()
            .iter()
            .filter_map(Command::deleted)
            .collect()
    }

    /// Vertex arrays created and not yet deleted.
    pub(crate) fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.borrow().len()
    }

    pub(crate) fn bound_vertex_array(&self) -> Option<u32> {
        self.bound_vertex_array.get()
    }

    /// Objects other than vertex arrays created and not yet deleted.
    pub(crate) fn live_objects(&self) -> usize {
        self.live.borrow().len()
    }

    /// Attribute locations currently enabled.
    pub(crate) fn enabled_attributes(&self) -> Vec<u32> {
        self.enabled.borrow().iter().copied().collect()
    }

    /// Attribute and uniform lookups that reached the device.
    pub(crate) fn location_queries(&self) -> usize {
        self.location_queries.get()
    }

    fn record(&self, command: Command) {
        self.commands.borrow_mut().push(command);
    }

    fn next_handle(&self) -> u32 {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        handle
    }

    fn create(&self) -> u32 {
        let handle = self.next_handle();
        self.live.borrow_mut().insert(handle);
        handle
    }

    /// Record `code` unless an earlier error is still pending.
    fn raise(&self, code: u32) {
        if self.pending_error.get() == 0 {
            self.pending_error.set(code);
        }
    }

    fn require_vertex_array(&self) {
        if self.bound_vertex_array.get().is_none() {
            self.raise(INVALID_OPERATION);
        }
    }

    fn delete(&self, handle: u32) {
        self.live.borrow_mut().remove(&handle);
    }

    fn bound_texture(&self) -> Option<u32> {
        self.bound_textures
            .borrow()
            .get(&self.active_unit.get())
            .copied()
    }
}

impl GraphicsDevice for RecordingDevice {
    type Buffer = u32;
    type Texture = u32;
    type Shader = u32;
    type Program = u32;
    type Framebuffer = u32;
    type Renderbuffer = u32;
    type VertexArray = u32;
    type UniformLocation = String;

    fn max_combined_texture_units(&self) -> u32 {
        self.texture_units
    }

    fn max_anisotropy(&self) -> Option<f32> {
        self.anisotropy
    }

    fn error_code(&self) -> u32 {
        self.pending_error.replace(0)
    }

    fn init_state(&self) {
        self.record(Command::InitState);
    }

    fn viewport(&self, viewport: Viewport) {
        self.record(Command::Viewport(viewport));
    }

    fn clear(&self) {
        self.record(Command::Clear);
    }

    fn read_pixels(&self, viewport: Viewport, _format: ImageFormat, out: &mut [u8]) {
        self.record(Command::ReadPixels(viewport));
        out.fill(0xab);
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let handle = self.next_handle();
        self.vertex_arrays.borrow_mut().insert(handle);
        self.record(Command::CreateVertexArray(handle));
        Ok(handle)
    }

    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        self.bound_vertex_array.set(vertex_array);
        self.record(Command::BindVertexArray(vertex_array));
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        self.vertex_arrays.borrow_mut().remove(&vertex_array);
        if self.bound_vertex_array.get() == Some(vertex_array) {
            self.bound_vertex_array.set(None);
        }
        self.record(Command::DeleteVertexArray(vertex_array));
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let handle = self.create();
        self.record(Command::CreateBuffer(handle));
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: u32) {
        self.delete(buffer);
        self.record(Command::DeleteBuffer(buffer));
    }

    fn bind_buffer(&self, kind: BufferKind, buffer: Option<u32>) {
        self.record(Command::BindBuffer(kind, buffer));
    }

    fn buffer_data(&self, kind: BufferKind, data: &[u8]) {
        self.record(Command::BufferData(kind, data.len()));
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        self.enabled.borrow_mut().insert(location);
        self.record(Command::EnableAttribute(location));
    }

    fn disable_vertex_attrib_array(&self, location: u32) {
        self.enabled.borrow_mut().remove(&location);
        self.record(Command::DisableAttribute(location));
    }

    fn vertex_attrib_pointer(&self, location: u32, components: usize, ty: ElementType, stride: usize) {
        self.require_vertex_array();
        self.record(Command::AttributePointer {
            location,
            components,
            ty,
            stride,
        });
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let handle = self.create();
        self.shader_stages.borrow_mut().insert(handle, stage);
        self.record(Command::CreateShader(stage, handle));
        Ok(handle)
    }

    fn compile_shader(&self, shader: u32, _source: &str) -> bool {
        let stage = self.shader_stages.borrow().get(&shader).copied();
        self.failing_compile.is_none() || stage != self.failing_compile
    }

    fn shader_info_log(&self, shader: u32) -> String {
        match self.shader_stages.borrow().get(&shader) {
            Some(stage) => format!("0:1: syntax error in {stage} shader"),
            None => String::new(),
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.delete(shader);
        self.record(Command::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<u32, String> {
        let handle = self.create();
        self.record(Command::CreateProgram(handle));
        Ok(handle)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        self.record(Command::AttachShader(program, shader));
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        self.record(Command::DetachShader(program, shader));
    }

    fn link_program(&self, _program: u32) -> bool {
        !self.failing_link
    }

    fn validate_program(&self, _program: u32) -> bool {
        !self.failing_validate
    }

    fn program_info_log(&self, _program: u32) -> String {
        "program rejected".to_owned()
    }

    fn delete_program(&self, program: u32) {
        self.delete(program);
        self.record(Command::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<u32>) {
        self.record(Command::UseProgram(program));
    }

    fn attribute_location(&self, _program: u32, name: &str) -> Option<u32> {
        self.location_queries.set(self.location_queries.get() + 1);
        self.attributes.get(name).copied()
    }

    fn uniform_location(&self, _program: u32, name: &str) -> Option<String> {
        self.location_queries.set(self.location_queries.get() + 1);
        self.uniforms.contains(name).then(|| name.to_owned())
    }

    fn uniform(&self, location: &String, value: UniformValue) {
        self.record(Command::Uniform(location.clone(), value));
    }

    fn create_texture(&self) -> Result<u32, String> {
        let handle = self.create();
        self.record(Command::CreateTexture(handle));
        Ok(handle)
    }

    fn delete_texture(&self, texture: u32) {
        self.delete(texture);
        self.images.borrow_mut().remove(&texture);
        self.bound_textures
            .borrow_mut()
            .retain(|_, bound| *bound != texture);
        self.record(Command::DeleteTexture(texture));
    }

    fn active_texture(&self, unit: u32) {
        self.active_unit.set(unit);
        self.record(Command::ActiveTexture(unit));
    }

    fn bind_texture(&self, texture: Option<u32>) {
        let unit = self.active_unit.get();
        match texture {
            Some(texture) => self.bound_textures.borrow_mut().insert(unit, texture),
            None => self.bound_textures.borrow_mut().remove(&unit),
        };
        self.record(Command::BindTexture(texture));
    }

    fn texture_filters(&self, min: MinFilter, mag: MagFilter) {
        self.record(Command::TextureFilters(min, mag));
    }

    fn texture_wrap(&self, s: WrapMode, t: WrapMode) {
        self.record(Command::TextureWrap(s, t));
    }

    fn texture_anisotropy(&self, level: f32) {
        self.record(Command::TextureAnisotropy(level));
    }

    fn tex_image_2d(&self, width: u32, height: u32, format: ImageFormat, pixels: Option<&[u8]>) {
        if let Some(texture) = self.bound_texture() {
            let pixels = pixels.map_or_else(
                || vec![0; format.byte_len(width, height)],
                <[u8]>::to_vec,
            );
            self.images.borrow_mut().insert(
                texture,
                Image {
                    width,
                    bytes_per_pixel: format.bytes_per_pixel(),
                    pixels,
                },
            );
        }
        self.record(Command::TexImage { width, height });
    }

    fn tex_sub_image_2d(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        _format: ImageFormat,
        pixels: &[u8],
    ) {
        if let Some(texture) = self.bound_texture() {
            if let Some(image) = self.images.borrow_mut().get_mut(&texture) {
                let row_len = width as usize * image.bytes_per_pixel;
                for row in 0..height as usize {
                    let start = ((y as usize + row) * image.width as usize + x as usize)
                        * image.bytes_per_pixel;
                    image.pixels[start..start + row_len]
                        .copy_from_slice(&pixels[row * row_len..(row + 1) * row_len]);
                }
            }
        }
        self.record(Command::TexSubImage {
            x,
            y,
            width,
            height,
        });
    }

    fn read_texture_image(&self, _width: u32, _height: u32, _format: ImageFormat) -> Option<Vec<u8>> {
        let texture = self.bound_texture()?;
        self.images
            .borrow()
            .get(&texture)
            .map(|image| image.pixels.clone())
    }

    fn create_renderbuffer(&self) -> Result<u32, String> {
        let handle = self.create();
        self.record(Command::CreateRenderbuffer(handle));
        Ok(handle)
    }

    fn delete_renderbuffer(&self, renderbuffer: u32) {
        self.delete(renderbuffer);
        self.record(Command::DeleteRenderbuffer(renderbuffer));
    }

    fn renderbuffer_storage(&self, renderbuffer: u32, storage: RenderBufferStorage, _width: u32, _height: u32) {
        self.record(Command::RenderbufferStorage(renderbuffer, storage));
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        let handle = self.create();
        self.record(Command::CreateFramebuffer(handle));
        Ok(handle)
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        self.delete(framebuffer);
        self.record(Command::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&self, framebuffer: Option<u32>) {
        self.record(Command::BindFramebuffer(framebuffer));
    }

    fn framebuffer_renderbuffer(&self, attachment: Attachment, renderbuffer: Option<u32>) {
        self.record(Command::FramebufferRenderbuffer(attachment, renderbuffer));
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        self.framebuffer_status
    }

    fn draw_arrays(&self, primitive: PrimitiveKind, first: usize, count: usize) {
        self.require_vertex_array();
        if let Some(code) = self.draw_error {
            self.pending_error.set(code);
        }
        self.record(Command::DrawArrays(primitive, first, count));
    }

    fn draw_elements(&self, primitive: PrimitiveKind, count: usize) {
        self.require_vertex_array();
        if let Some(code) = self.draw_error {
            self.pending_error.set(code);
        }
        self.record(Command::DrawElements(primitive, count));
    }
}
