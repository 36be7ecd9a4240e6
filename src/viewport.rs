//! The nested viewport stack.

use crate::device::GraphicsDevice;
use crate::error::{Error, Result};
use crate::types::Viewport;

/// Viewport rectangles, the top one active. Never empty.
#[derive(Debug)]
pub(crate) struct ViewportStack {
    entries: Vec<Viewport>,
}

impl ViewportStack {
    /// A stack holding the single `(0, 0, 0, 0)` entry.
    pub(crate) fn new() -> Self {
        Self {
            entries: vec![Viewport::default()],
        }
    }

    pub(crate) fn top(&self) -> Viewport {
        self.entries.last().copied().unwrap_or_default()
    }

    /// Duplicate the top entry. No device call.
    pub(crate) fn push(&mut self) {
        let top = self.top();
        self.entries.push(top);
    }

    /// Replace the top entry and apply it.
    pub(crate) fn set<D: GraphicsDevice>(&mut self, device: &D, viewport: Viewport) {
        if let Some(top) = self.entries.last_mut() {
            *top = viewport;
        }
        device.viewport(viewport);
    }

    /// Drop the top entry and re-apply the one below.
    ///
    /// # Errors
    ///
    /// [`Error::ViewportUnderflow`] when only the base entry is left.
    pub(crate) fn pop<D: GraphicsDevice>(&mut self, device: &D) -> Result<()> {
        if self.entries.len() <= 1 {
            return Err(Error::ViewportUnderflow);
        }
        self.entries.pop();
        device.viewport(self.top());
        Ok(())
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }
}
