//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

use crate::types::ShaderStage;

/// Everything that can go wrong while creating, binding, drawing with, or
/// disposing a resource.
///
/// None of these are retried internally. They propagate to the caller's
/// frame loop, which decides whether to abort the frame or the process.
#[derive(Error, Debug)]
pub enum Error {
    /// A shader stage failed to compile. Carries the driver's info log.
    #[error("error while compiling the {stage} shader: {log}")]
    CompileError {
        /// The stage that failed.
        stage: ShaderStage,
        /// The driver's compiler log.
        log: String,
    },

    /// The program failed to link or validate.
    #[error("error while {phase} the program: {log}")]
    LinkError {
        /// `"linking"` or `"validating"`.
        phase: &'static str,
        /// The driver's program log.
        log: String,
    },

    /// Every texture unit is in use.
    #[error("no free texture unit; dispose an existing texture first")]
    ResourceExhausted,

    /// The device rejected a framebuffer attachment combination.
    #[error("invalid frame buffer status: {status:#06x}")]
    IncompleteTarget {
        /// The raw framebuffer status.
        status: u32,
    },

    /// Two vertex streams in the same draw call have different lengths.
    #[error("vertex stream `{name}` has {found} elements, expected {expected}")]
    AttributeLengthMismatch {
        /// The parameter whose length differs.
        name: String,
        /// Length of the first vertex stream.
        expected: usize,
        /// Length of this stream.
        found: usize,
    },

    /// A non-indexed draw had no vertex stream to size it.
    #[error("there are no buffers to draw")]
    NoDrawableBuffers,

    /// A parameter value cannot be bound the way it was supplied.
    #[error("parameter `{name}` cannot be bound: {reason}")]
    UnsupportedParameterType {
        /// The offending parameter.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A buffer was bound to an attribute while already bound.
    #[error("buffer is already bound to an attribute location")]
    AlreadyBound,

    /// A buffer was disabled while not bound.
    #[error("buffer is not bound to an attribute location")]
    NotBound,

    /// The device reported an error after a state-changing call.
    #[error("GL error: {code:#06x}")]
    DeviceError {
        /// The device's error code.
        code: u32,
    },

    /// The device could not create an object handle.
    #[error("failed to create device object: {0}")]
    ObjectCreation(String),

    /// The resource, or the whole context, has already been disposed.
    #[error("resource has been disposed")]
    Disposed,

    /// The id does not name a resource of this context.
    #[error("unknown resource id")]
    UnknownResource,

    /// Vertex data sent to an index buffer or vice versa.
    #[error("operation does not match the buffer kind")]
    WrongBufferKind,

    /// Uploaded vertices are smaller than one vertex of the buffer layout.
    #[error("vertex type is {found} bytes, the buffer layout needs {expected}")]
    VertexLayoutMismatch {
        /// Bytes per vertex the buffer layout describes.
        expected: usize,
        /// Size of the uploaded vertex type.
        found: usize,
    },

    /// Vertex attributes carry one to four components.
    #[error("component count {0} is outside 1..=4")]
    InvalidComponentCount(usize),

    /// `pop_viewport` without a matching `push_viewport`.
    #[error("viewport stack underflow")]
    ViewportUnderflow,

    /// `activate` on a render target that is already active.
    #[error("render target is already active")]
    TargetAlreadyActive,

    /// `deactivate` on a render target that is not active.
    #[error("render target is not active")]
    TargetNotActive,

    /// Sub-image update before any full image upload.
    #[error("texture has no image storage yet")]
    NoImageStorage,

    /// Sub-image region does not fit inside the texture.
    #[error("region {width}x{height} at ({x}, {y}) exceeds the texture storage")]
    #[allow(missing_docs)]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Pixel buffer length does not match the declared dimensions.
    #[error("pixel data has {found} bytes, expected {expected}")]
    ImageSizeMismatch {
        /// Bytes the dimensions and format call for.
        expected: usize,
        /// Bytes supplied.
        found: usize,
    },

    /// Decoding an encoded image failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Reading shader sources from disk failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, Error>;
