//! Plain data types shared between the context and the device boundary.
//!
//! These are backend-neutral: the glow device maps each of them to the
//! matching GL enum, and the test device records them as-is.

use std::fmt;

/// A viewport rectangle in window pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Viewport {
    /// Create a viewport rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle of `width` x `height` pixels at `(x, y)`. Dimensions
    /// beyond `i32::MAX` saturate.
    #[must_use]
    pub fn sized(x: i32, y: i32, width: u32, height: u32) -> Self {
        let extent = |value: u32| i32::try_from(value).unwrap_or(i32::MAX);
        Self::new(x, y, extent(width), extent(height))
    }
}

/// A programmable pipeline stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Runs once per vertex.
    Vertex,
    /// Runs once per fragment.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Which binding point a buffer lives on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data (`GL_ARRAY_BUFFER`).
    Vertex,
    /// Element indices (`GL_ELEMENT_ARRAY_BUFFER`).
    Index,
}

/// Component type of the elements stored in a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// `i8`.
    Byte,
    /// `u8`.
    UnsignedByte,
    /// `i16`.
    Short,
    /// `u16`.
    UnsignedShort,
    /// `i32`.
    Int,
    /// `u32`.
    UnsignedInt,
    /// `f32`.
    Float,
}

impl ElementType {
    /// Size of one component in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            ElementType::Byte | ElementType::UnsignedByte => 1,
            ElementType::Short | ElementType::UnsignedShort => 2,
            ElementType::Int | ElementType::UnsignedInt | ElementType::Float => 4,
        }
    }
}

/// Primitive assembly mode for a draw call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PrimitiveKind {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Texture minification filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

/// Texture magnification filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MagFilter {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    Linear,
}

/// Texture coordinate wrapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Repeat the edge texel.
    ClampToEdge,
    /// Tile.
    Repeat,
    /// Tile, mirroring every other copy.
    MirroredRepeat,
}

/// Sampling parameters fixed at texture creation.
///
/// `anisotropy: None` uses the context's default anisotropy.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureParams {
    /// Filter when the texture is shrunk.
    pub min_filter: MinFilter,
    /// Filter when the texture is enlarged.
    pub mag_filter: MagFilter,
    /// Wrapping along `s` (horizontal).
    pub wrap_s: WrapMode,
    /// Wrapping along `t` (vertical).
    pub wrap_t: WrapMode,
    /// Anisotropic filtering level.
    pub anisotropy: Option<f32>,
}

impl TextureParams {
    /// Same filter and wrap mode on both axes, default anisotropy.
    #[must_use]
    pub const fn uniform(min_filter: MinFilter, mag_filter: MagFilter, wrap: WrapMode) -> Self {
        Self {
            min_filter,
            mag_filter,
            wrap_s: wrap,
            wrap_t: wrap,
            anisotropy: None,
        }
    }
}

impl Default for TextureParams {
    fn default() -> Self {
        Self::uniform(MinFilter::Linear, MagFilter::Linear, WrapMode::ClampToEdge)
    }
}

/// Channel layout of client-side pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PixelFormat {
    Red,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    DepthComponent,
}

impl PixelFormat {
    /// Number of channels per pixel.
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Red | PixelFormat::DepthComponent => 1,
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
        }
    }
}

/// Component type of client-side pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// One byte per channel.
    UnsignedByte,
    /// One `f32` per channel.
    Float,
}

impl PixelType {
    /// Size of one channel in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            PixelType::UnsignedByte => 1,
            PixelType::Float => 4,
        }
    }
}

/// How the device stores texels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum InternalFormat {
    R8,
    Rgb8,
    Rgba8,
    Rgba32F,
    DepthComponent24,
}

/// The full description of an image's layout, on both sides of an upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ImageFormat {
    /// Device-side texel format.
    pub internal: InternalFormat,
    /// Client-side channel layout.
    pub format: PixelFormat,
    /// Client-side channel type.
    pub ty: PixelType,
}

impl ImageFormat {
    /// 8-bit RGBA, the layout produced by `image::RgbaImage`.
    pub const RGBA8: Self = Self {
        internal: InternalFormat::Rgba8,
        format: PixelFormat::Rgba,
        ty: PixelType::UnsignedByte,
    };

    /// 8-bit BGRA stored as RGBA, the usual layout of decoded bitmaps.
    pub const BGRA8: Self = Self {
        internal: InternalFormat::Rgba8,
        format: PixelFormat::Bgra,
        ty: PixelType::UnsignedByte,
    };

    /// Bytes per pixel of the client-side data.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        self.format.channels() * self.ty.size()
    }

    /// Byte length of a `width` x `height` image in this format.
    #[must_use]
    pub const fn byte_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// A borrowed image ready for upload.
#[derive(Debug, Copy, Clone)]
pub struct ImageData<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of `pixels`.
    pub format: ImageFormat,
    /// Tightly packed rows, bottom row first.
    pub pixels: &'a [u8],
}

/// Storage format of a render buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum RenderBufferStorage {
    Rgba8,
    DepthComponent16,
    DepthComponent24,
    Depth24Stencil8,
}

/// Framebuffer attachment point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// The first color attachment.
    Color0,
    /// The depth attachment.
    Depth,
}

/// Outcome of a framebuffer completeness query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    /// Ready to draw into.
    Complete,
    /// The device's raw status code.
    Incomplete(u32),
}

/// A value uploaded to a uniform location.
#[derive(Debug, Copy, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major 3x3 matrix.
    Mat3([f32; 9]),
    /// Column-major 4x4 matrix.
    Mat4([f32; 16]),
}
