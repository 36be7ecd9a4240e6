//! Resource ids, the typed tables that own resources, and the
//! creation-ordered disposal registry.

use std::marker::PhantomData;

use crate::atomic::AtomicLong;
use crate::error::{Error, Result};

static CONTEXTS: AtomicLong = AtomicLong::new(0);

/// A fresh tag for the tables of one context, so ids issued by another
/// context are refused instead of resolving to an unrelated slot.
pub(crate) fn next_owner() -> i64 {
    CONTEXTS.increment()
}

/// An id that addresses one slot of one context's [`Table`].
pub(crate) trait Slot: Copy {
    fn from_parts(owner: i64, index: usize) -> Self;
    fn owner(self) -> i64;
    fn slot(self) -> usize;
}

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            owner: i64,
            index: usize,
        }

        impl $name {
            pub(crate) const fn new(owner: i64, index: usize) -> Self {
                Self { owner, index }
            }

            /// Position of the resource in its table.
            #[must_use]
            pub const fn index(self) -> usize {
                self.index
            }
        }

        impl Slot for $name {
            fn from_parts(owner: i64, index: usize) -> Self {
                Self::new(owner, index)
            }

            fn owner(self) -> i64 {
                self.owner
            }

            fn slot(self) -> usize {
                self.index
            }
        }
    };
}

resource_id!(
    /// A vertex or index buffer owned by a [`Context`](crate::Context).
    BufferId
);
resource_id!(
    /// A texture owned by a [`Context`](crate::Context).
    TextureId
);
resource_id!(
    /// A linked shader program owned by a [`Context`](crate::Context).
    ProgramId
);
resource_id!(
    /// A render buffer owned by a [`Context`](crate::Context).
    RenderBufferId
);
resource_id!(
    /// An off-screen render target owned by a [`Context`](crate::Context).
    RenderTargetId
);

/// Any resource id, as recorded in the disposal registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ResourceKey {
    Buffer(BufferId),
    Texture(TextureId),
    Program(ProgramId),
    RenderBuffer(RenderBufferId),
    RenderTarget(RenderTargetId),
}

impl From<BufferId> for ResourceKey {
    fn from(id: BufferId) -> Self {
        Self::Buffer(id)
    }
}

impl From<TextureId> for ResourceKey {
    fn from(id: TextureId) -> Self {
        Self::Texture(id)
    }
}

impl From<ProgramId> for ResourceKey {
    fn from(id: ProgramId) -> Self {
        Self::Program(id)
    }
}

impl From<RenderBufferId> for ResourceKey {
    fn from(id: RenderBufferId) -> Self {
        Self::RenderBuffer(id)
    }
}

impl From<RenderTargetId> for ResourceKey {
    fn from(id: RenderTargetId) -> Self {
        Self::RenderTarget(id)
    }
}

/// Append-only slots for one resource type. A disposed resource leaves an
/// empty slot behind so ids are never reused.
pub(crate) struct Table<I, T> {
    owner: i64,
    slots: Vec<Option<T>>,
    ids: PhantomData<I>,
}

impl<I: Slot, T> Table<I, T> {
    pub(crate) const fn new(owner: i64) -> Self {
        Self {
            owner,
            slots: Vec::new(),
            ids: PhantomData,
        }
    }

    /// Store `value`, returning its id.
    pub(crate) fn insert(&mut self, value: T) -> I {
        self.slots.push(Some(value));
        I::from_parts(self.owner, self.slots.len() - 1)
    }

    fn slot(&self, id: I) -> Result<&Option<T>> {
        if id.owner() != self.owner {
            return Err(Error::UnknownResource);
        }
        self.slots.get(id.slot()).ok_or(Error::UnknownResource)
    }

    fn slot_mut(&mut self, id: I) -> Result<&mut Option<T>> {
        if id.owner() != self.owner {
            return Err(Error::UnknownResource);
        }
        self.slots.get_mut(id.slot()).ok_or(Error::UnknownResource)
    }

    pub(crate) fn get(&self, id: I) -> Result<&T> {
        self.slot(id)?.as_ref().ok_or(Error::Disposed)
    }

    pub(crate) fn get_mut(&mut self, id: I) -> Result<&mut T> {
        self.slot_mut(id)?.as_mut().ok_or(Error::Disposed)
    }

    /// Empty the slot. `Ok(None)` when it was already empty.
    pub(crate) fn take(&mut self, id: I) -> Result<Option<T>> {
        Ok(self.slot_mut(id)?.take())
    }

    /// Number of occupied slots.
    pub(crate) fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Every resource a context created, in creation order.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    keys: Vec<ResourceKey>,
}

impl Registry {
    pub(crate) fn register(&mut self, key: impl Into<ResourceKey>) {
        let key = key.into();
        log::trace!("registered {key:?} for disposal");
        self.keys.push(key);
    }

    /// Drain the registry newest first.
    pub(crate) fn drain_reverse(&mut self) -> impl Iterator<Item = ResourceKey> {
        std::mem::take(&mut self.keys).into_iter().rev()
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}
