//! Render buffers and the off-screen targets built from them.

use crate::device::{created, GraphicsDevice};
use crate::error::{Error, Result};
use crate::registry::RenderBufferId;
use crate::types::{Attachment, FramebufferStatus, RenderBufferStorage, Viewport};
use crate::viewport::ViewportStack;

/// Storage for one framebuffer attachment.
#[derive(Debug)]
pub struct RenderBuffer<D: GraphicsDevice> {
    handle: D::Renderbuffer,
    width: u32,
    height: u32,
    storage: RenderBufferStorage,
}

impl<D: GraphicsDevice> RenderBuffer<D> {
    pub(crate) fn new(
        device: &D,
        width: u32,
        height: u32,
        storage: RenderBufferStorage,
    ) -> Result<Self> {
        let handle = created(device.create_renderbuffer())?;
        device.renderbuffer_storage(handle, storage, width, height);
        Ok(Self {
            handle,
            width,
            height,
            storage,
        })
    }

    pub(crate) fn destroy(self, device: &D) {
        device.delete_renderbuffer(self.handle);
    }

    /// The device handle.
    pub fn handle(&self) -> D::Renderbuffer {
        self.handle
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Storage format.
    pub fn storage(&self) -> RenderBufferStorage {
        self.storage
    }
}

/// An off-screen color + depth destination.
///
/// Moves between inactive and active: activation binds the framebuffer and
/// pushes a viewport covering the target, deactivation pops it and binds the
/// default framebuffer again.
#[derive(Debug)]
pub struct RenderTarget<D: GraphicsDevice> {
    framebuffer: D::Framebuffer,
    color: RenderBufferId,
    depth: RenderBufferId,
    width: u32,
    height: u32,
    owns_attachments: bool,
    active: bool,
}

impl<D: GraphicsDevice> RenderTarget<D> {
    /// Attach `color` and `depth` to a new framebuffer. The target takes the
    /// color buffer's size.
    ///
    /// # Errors
    ///
    /// [`Error::IncompleteTarget`] if the device rejects the combination, in
    /// which case the framebuffer is deleted again.
    pub(crate) fn new(
        device: &D,
        (color, color_buffer): (RenderBufferId, &RenderBuffer<D>),
        (depth, depth_buffer): (RenderBufferId, &RenderBuffer<D>),
        owns_attachments: bool,
    ) -> Result<Self> {
        let framebuffer = created(device.create_framebuffer())?;
        device.bind_framebuffer(Some(framebuffer));
        device.framebuffer_renderbuffer(Attachment::Color0, Some(color_buffer.handle));
        device.framebuffer_renderbuffer(Attachment::Depth, Some(depth_buffer.handle));
        let status = device.framebuffer_status();
        device.bind_framebuffer(None);

        if let FramebufferStatus::Incomplete(status) = status {
            device.delete_framebuffer(framebuffer);
            return Err(Error::IncompleteTarget { status });
        }
        Ok(Self {
            framebuffer,
            color,
            depth,
            width: color_buffer.width,
            height: color_buffer.height,
            owns_attachments,
            active: false,
        })
    }

    /// Redirect drawing into this target.
    ///
    /// # Errors
    ///
    /// [`Error::TargetAlreadyActive`] if the target is active.
    pub(crate) fn activate(&mut self, device: &D, viewports: &mut ViewportStack) -> Result<()> {
        if self.active {
            return Err(Error::TargetAlreadyActive);
        }
        device.bind_framebuffer(Some(self.framebuffer));
        viewports.push();
        viewports.set(device, Viewport::sized(0, 0, self.width, self.height));
        self.active = true;
        Ok(())
    }

    /// Restore the previous viewport and the default framebuffer.
    ///
    /// # Errors
    ///
    /// [`Error::TargetNotActive`] if the target is not active.
    pub(crate) fn deactivate(&mut self, device: &D, viewports: &mut ViewportStack) -> Result<()> {
        if !self.active {
            return Err(Error::TargetNotActive);
        }
        self.active = false;
        viewports.pop(device)?;
        device.bind_framebuffer(None);
        Ok(())
    }

    /// Detach both attachments and delete the framebuffer. Returns the
    /// attachments the caller must dispose when the target owns them.
    pub(crate) fn destroy(self, device: &D) -> Option<[RenderBufferId; 2]> {
        device.bind_framebuffer(Some(self.framebuffer));
        device.framebuffer_renderbuffer(Attachment::Color0, None);
        device.framebuffer_renderbuffer(Attachment::Depth, None);
        device.bind_framebuffer(None);
        device.delete_framebuffer(self.framebuffer);
        self.owns_attachments.then_some([self.color, self.depth])
    }

    /// The framebuffer handle.
    pub fn framebuffer(&self) -> D::Framebuffer {
        self.framebuffer
    }

    /// The color attachment.
    pub fn color(&self) -> RenderBufferId {
        self.color
    }

    /// The depth attachment.
    pub fn depth(&self) -> RenderBufferId {
        self.depth
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether disposing the target also disposes its attachments.
    pub fn owns_attachments(&self) -> bool {
        self.owns_attachments
    }

    /// Whether drawing currently goes into this target.
    pub fn is_active(&self) -> bool {
        self.active
    }
}
