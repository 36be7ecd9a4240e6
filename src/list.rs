//! A persistent singly-linked list.
//!
//! [`ImmutableList::cons`] returns a new list that shares every node of the
//! list it extends, so a base parameter list can be extended with a
//! different per-draw entry each frame while the base stays untouched and
//! shared between draw calls.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

struct Node<T> {
    value: T,
    next: Option<Arc<Node<T>>>,
}

/// A persistent, structurally shared list with O(1) prepend.
pub struct ImmutableList<T> {
    head: Option<Arc<Node<T>>>,
    len: usize,
}

impl<T> ImmutableList<T> {
    /// The empty list.
    #[must_use]
    pub const fn nil() -> Self {
        Self { head: None, len: 0 }
    }

    /// A new list with `value` in front of `self`. `self` is unchanged.
    #[must_use]
    pub fn cons(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                value,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// The first element.
    #[must_use]
    pub fn head(&self) -> Option<&T> {
        self.head.as_deref().map(|node| &node.value)
    }

    /// Everything after the first element, or `None` for the empty list.
    #[must_use]
    pub fn tail(&self) -> Option<Self> {
        self.head.as_deref().map(|node| Self {
            head: node.next.clone(),
            len: self.len - 1,
        })
    }

    /// Whether the list has no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Iterate front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
            remaining: self.len,
        }
    }

    /// Element at `index`, counting from the front.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }

    /// Fold front to back.
    pub fn fold_left<A>(&self, initial: A, f: impl FnMut(A, &T) -> A) -> A {
        self.iter().fold(initial, f)
    }

    /// Whether any element equals `value`.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.iter().any(|item| item == value)
    }
}

impl<T: Clone> ImmutableList<T> {
    /// The elements front to back.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// A new list with the elements in reverse order.
    #[must_use]
    pub fn reverse(&self) -> Self {
        self.fold_left(Self::nil(), |acc, item| acc.cons(item.clone()))
    }
}

impl<T> Clone for ImmutableList<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for ImmutableList<T> {
    fn default() -> Self {
        Self::nil()
    }
}

// Unlink iteratively so dropping a long, unshared list cannot overflow the
// stack through recursive `Arc<Node>` drops.
impl<T> Drop for ImmutableList<T> {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

/// Builds a list whose iteration order matches the source order.
impl<T> FromIterator<T> for ImmutableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Vec<T> = iter.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Self::nil(), |list, item| list.cons(item))
    }
}

impl<T: fmt::Debug> fmt::Debug for ImmutableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for ImmutableList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for ImmutableList<T> {}

impl<'a, T> IntoIterator for &'a ImmutableList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Front-to-back iterator over an [`ImmutableList`].
pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
