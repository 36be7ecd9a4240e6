//! Textures pinned to a single texture unit.

use crate::device::{created, GraphicsDevice};
use crate::error::{Error, Result};
use crate::types::{ImageData, ImageFormat, TextureParams};

/// Dimensions and layout of the last full upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureStorage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of the uploaded data.
    pub format: ImageFormat,
}

/// A texture handle that occupies one texture unit for its whole lifetime.
///
/// Sampling it only needs the unit index, so the texture stays bound to its
/// unit between draws and uploads re-establish that binding first.
#[derive(Debug)]
pub struct Texture<D: GraphicsDevice> {
    handle: D::Texture,
    unit: u32,
    params: TextureParams,
    storage: Option<TextureStorage>,
}

impl<D: GraphicsDevice> Texture<D> {
    /// Create a texture on `unit`. `params.anisotropy` must already be
    /// resolved: `None` here means anisotropic filtering is not applied.
    pub(crate) fn new(device: &D, unit: u32, params: TextureParams) -> Result<Self> {
        device.active_texture(unit);
        let handle = created(device.create_texture())?;
        let texture = Self {
            handle,
            unit,
            params,
            storage: None,
        };
        texture.prepare(device);
        Ok(texture)
    }

    /// Re-activate the unit, re-bind, and re-apply the sampling parameters.
    fn prepare(&self, device: &D) {
        device.active_texture(self.unit);
        device.bind_texture(Some(self.handle));
        device.texture_filters(self.params.min_filter, self.params.mag_filter);
        device.texture_wrap(self.params.wrap_s, self.params.wrap_t);
        if let Some(level) = self.params.anisotropy {
            device.texture_anisotropy(level);
        }
    }

    /// Replace the full image.
    ///
    /// # Errors
    ///
    /// [`Error::ImageSizeMismatch`] if the pixel slice does not match the
    /// declared dimensions and format.
    pub(crate) fn upload_image(&mut self, device: &D, image: &ImageData<'_>) -> Result<()> {
        let expected = image.format.byte_len(image.width, image.height);
        if image.pixels.len() != expected {
            return Err(Error::ImageSizeMismatch {
                expected,
                found: image.pixels.len(),
            });
        }
        self.prepare(device);
        device.tex_image_2d(image.width, image.height, image.format, Some(image.pixels));
        self.storage = Some(TextureStorage {
            width: image.width,
            height: image.height,
            format: image.format,
        });
        Ok(())
    }

    /// Allocate zero-filled storage.
    pub(crate) fn allocate(&mut self, device: &D, width: u32, height: u32, format: ImageFormat) {
        let zeroes = vec![0; format.byte_len(width, height)];
        self.prepare(device);
        device.tex_image_2d(width, height, format, Some(&zeroes));
        self.storage = Some(TextureStorage {
            width,
            height,
            format,
        });
    }

    /// Overwrite a region, in the format of the last full upload.
    ///
    /// # Errors
    ///
    /// [`Error::NoImageStorage`] before any full upload,
    /// [`Error::RegionOutOfBounds`] if the region does not fit, and
    /// [`Error::ImageSizeMismatch`] if `pixels` does not cover the region.
    pub(crate) fn upload_sub_image(
        &mut self,
        device: &D,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        let storage = self.storage.ok_or(Error::NoImageStorage)?;
        let fits = |offset: u32, extent: u32, limit: u32| {
            offset.checked_add(extent).is_some_and(|end| end <= limit)
        };
        if !fits(x, width, storage.width) || !fits(y, height, storage.height) {
            return Err(Error::RegionOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        let expected = storage.format.byte_len(width, height);
        if pixels.len() != expected {
            return Err(Error::ImageSizeMismatch {
                expected,
                found: pixels.len(),
            });
        }
        self.prepare(device);
        device.tex_sub_image_2d(x, y, width, height, storage.format, pixels);
        Ok(())
    }

    /// Read the full image back. `Ok(None)` when the device cannot read
    /// textures.
    ///
    /// # Errors
    ///
    /// [`Error::NoImageStorage`] before any upload.
    pub(crate) fn read_image(&self, device: &D) -> Result<Option<Vec<u8>>> {
        let storage = self.storage.ok_or(Error::NoImageStorage)?;
        device.active_texture(self.unit);
        device.bind_texture(Some(self.handle));
        Ok(device.read_texture_image(storage.width, storage.height, storage.format))
    }

    /// Delete the handle, returning the unit to hand back to the pool.
    pub(crate) fn destroy(self, device: &D) -> u32 {
        device.delete_texture(self.handle);
        self.unit
    }

    /// The device handle.
    pub fn handle(&self) -> D::Texture {
        self.handle
    }

    /// The texture unit this texture is sampled through.
    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// Sampling parameters, with anisotropy resolved.
    pub fn params(&self) -> TextureParams {
        self.params
    }

    /// Layout of the last full upload.
    pub fn storage(&self) -> Option<TextureStorage> {
        self.storage
    }
}
