//! GPU resource management and parameter-bound draw dispatch for OpenGL via
//! [glow].
//!
//! A [`Context`] owns a [`GraphicsDevice`] and every buffer, texture, shader
//! program, render buffer and render target created through it. Resources
//! are handed out as small `Copy` ids and torn down together, newest first,
//! when the context is disposed or dropped.
//!
//! Drawing takes a named parameter sequence: each [`Param`] is either a
//! vertex stream bound to the attribute of the same name or a uniform value
//! (scalar, vector, matrix or texture). [`Context::run_program`] binds them
//! all, issues the draw, and unbinds the streams again.
//!
//! # Features
//!
//! - **Texture unit pool**: every texture keeps one unit for its lifetime, so
//!   sampling it is a single integer uniform.
//! - **Viewport stack**: render targets push a viewport covering themselves
//!   on activation and restore the previous one on deactivation.
//! - **Validated draws**: mismatched stream lengths are rejected before any
//!   device command is issued.
//! - **Debug checks**: with [`ContextConfig::debug_checks`] the device error
//!   state is queried after every call.
//! - **Persistent parameter lists**: [`ImmutableList`] shares a base list
//!   between draws while each draw prepends its own entries.
//! - **Texture quads**: [`TextureRenderer`] draws a texture onto a full
//!   quad under a caller-supplied transform.
//!
//! # Safety
//!
//! [`GlowDevice::new`] is `unsafe`: the wrapped OpenGL context must be
//! current on the calling thread for as long as the device is used. Past
//! that point the API is safe.
//!
//! [glow]: https://docs.rs/glow

mod atomic;
mod buffer;
mod context;
mod device;
mod dispatch;
mod error;
mod list;
mod params;
mod program;
mod registry;
mod renderer;
mod target;
#[cfg(test)]
mod testing;
mod texture;
mod types;
mod viewport;

pub use atomic::{
    AtomicBoolean, AtomicDouble, AtomicFloat, AtomicInteger, AtomicLong, AtomicReference,
};
pub use buffer::GpuBuffer;
pub use context::{Context, ContextConfig};
#[cfg(feature = "glow")]
pub use device::GlowDevice;
pub use device::{check_errors, GraphicsDevice};
pub use error::{Error, Result};
pub use list::{ImmutableList, Iter};
pub use params::{MutableParameterSet, Param, ParamValue};
pub use program::ShaderProgram;
pub use registry::{BufferId, ProgramId, RenderBufferId, RenderTargetId, ResourceKey, TextureId};
pub use renderer::{TextureRenderer, TEXTURE_FRAGMENT_SRC, TEXTURE_VERTEX_SRC};
pub use target::{RenderBuffer, RenderTarget};
pub use texture::{Texture, TextureStorage};
pub use types::{
    Attachment, BufferKind, ElementType, FramebufferStatus, ImageData, ImageFormat,
    InternalFormat, MagFilter, MinFilter, PixelFormat, PixelType, PrimitiveKind,
    RenderBufferStorage, ShaderStage, TextureParams, UniformValue, Viewport, WrapMode,
};
