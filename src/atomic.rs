//! Process-wide atomic cells for counters and flags shared across threads.
//!
//! Each cell offers `get`, `set`, `exchange`, `compare_exchange`, and
//! `update`, which applies a pure function through a load/compute/CAS retry
//! loop. The loop has no retry bound: under heavy contention a thread may
//! starve. The function may run several times and must not have side
//! effects.
//!
//! These cells are independent of the draw pipeline, which is
//! single-threaded.

use std::sync::atomic::{self, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

/// Implements a cell over an integer or boolean std atomic.
macro_rules! atomic_cell {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $value:ty) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name($inner);

        impl $name {
            /// Create a cell holding `value`.
            #[must_use]
            pub const fn new(value: $value) -> Self {
                Self(<$inner>::new(value))
            }

            /// Current value.
            pub fn get(&self) -> $value {
                self.0.load(Ordering::SeqCst)
            }

            /// Overwrite the value.
            pub fn set(&self, value: $value) {
                self.0.store(value, Ordering::SeqCst);
            }

            /// Store `value`, returning the previous value.
            pub fn exchange(&self, value: $value) -> $value {
                self.0.swap(value, Ordering::SeqCst)
            }

            /// Store `new` if the cell holds `current`.
            ///
            /// # Errors
            ///
            /// Returns the actual value when it differs from `current`.
            pub fn compare_exchange(&self, current: $value, new: $value) -> Result<$value, $value> {
                self.0
                    .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
            }

            /// Atomically replace the value with `f(value)`, returning the new
            /// value.
            pub fn update(&self, mut f: impl FnMut($value) -> $value) -> $value {
                let mut current = self.get();
                loop {
                    let new = f(current);
                    match self.compare_exchange(current, new) {
                        Ok(_) => return new,
                        Err(actual) => current = actual,
                    }
                }
            }
        }
    };
}

/// Adds increment/decrement to an integer cell.
macro_rules! counter_ops {
    ($name:ident, $value:ty) => {
        impl $name {
            /// Add one, returning the new value. Wraps on overflow.
            pub fn increment(&self) -> $value {
                self.0.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
            }

            /// Subtract one, returning the new value. Wraps on overflow.
            pub fn decrement(&self) -> $value {
                self.0.fetch_sub(1, Ordering::SeqCst).wrapping_sub(1)
            }
        }
    };
}

atomic_cell!(
    /// A boolean flag.
    AtomicBoolean,
    atomic::AtomicBool,
    bool
);
atomic_cell!(
    /// A 32-bit signed counter.
    AtomicInteger,
    atomic::AtomicI32,
    i32
);
atomic_cell!(
    /// A 64-bit signed counter.
    AtomicLong,
    atomic::AtomicI64,
    i64
);
counter_ops!(AtomicInteger, i32);
counter_ops!(AtomicLong, i64);

/// Implements a floating-point cell stored as its bit pattern.
///
/// Comparisons in `compare_exchange` are bitwise, so `NaN` matches an
/// identical `NaN` and `0.0` does not match `-0.0`.
macro_rules! float_cell {
    ($(#[$meta:meta])* $name:ident, $bits:ty, $value:ty) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name($bits);

        impl $name {
            /// Create a cell holding `value`.
            #[must_use]
            pub fn new(value: $value) -> Self {
                Self(<$bits>::new(value.to_bits()))
            }

            /// Current value.
            pub fn get(&self) -> $value {
                <$value>::from_bits(self.0.load(Ordering::SeqCst))
            }

            /// Overwrite the value.
            pub fn set(&self, value: $value) {
                self.0.store(value.to_bits(), Ordering::SeqCst);
            }

            /// Store `value`, returning the previous value.
            pub fn exchange(&self, value: $value) -> $value {
                <$value>::from_bits(self.0.swap(value.to_bits(), Ordering::SeqCst))
            }

            /// Store `new` if the cell holds exactly `current`.
            ///
            /// # Errors
            ///
            /// Returns the actual value when it differs from `current`.
            pub fn compare_exchange(&self, current: $value, new: $value) -> Result<$value, $value> {
                self.0
                    .compare_exchange(
                        current.to_bits(),
                        new.to_bits(),
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .map(<$value>::from_bits)
                    .map_err(<$value>::from_bits)
            }

            /// Atomically replace the value with `f(value)`, returning the new
            /// value.
            pub fn update(&self, mut f: impl FnMut($value) -> $value) -> $value {
                let mut current = self.0.load(Ordering::SeqCst);
                loop {
                    let new = f(<$value>::from_bits(current)).to_bits();
                    match self
                        .0
                        .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
                    {
                        Ok(_) => return <$value>::from_bits(new),
                        Err(actual) => current = actual,
                    }
                }
            }
        }
    };
}

float_cell!(
    /// A single-precision float.
    AtomicFloat,
    atomic::AtomicU32,
    f32
);
float_cell!(
    /// A double-precision float.
    AtomicDouble,
    atomic::AtomicU64,
    f64
);

/// A shared reference that can be swapped between threads.
///
/// Identity, not equality, decides `compare_exchange`: the cell must hold the
/// very same allocation as `current`.
#[derive(Debug, Default)]
pub struct AtomicReference<T> {
    value: ArcSwap<T>,
}

impl<T> AtomicReference<T> {
    /// Create a cell holding `value`.
    pub fn new(value: impl Into<Arc<T>>) -> Self {
        Self {
            value: ArcSwap::new(value.into()),
        }
    }

    /// Current reference.
    pub fn get(&self) -> Arc<T> {
        self.value.load_full()
    }

    /// Overwrite the reference.
    pub fn set(&self, value: impl Into<Arc<T>>) {
        self.value.store(value.into());
    }

    /// Store `value`, returning the previous reference.
    pub fn exchange(&self, value: impl Into<Arc<T>>) -> Arc<T> {
        self.value.swap(value.into())
    }

    /// Store `new` if the cell holds `current`.
    ///
    /// # Errors
    ///
    /// Returns the actual reference when it is not `current`.
    pub fn compare_exchange(&self, current: &Arc<T>, new: Arc<T>) -> Result<Arc<T>, Arc<T>> {
        let previous = Guard::into_inner(self.value.compare_and_swap(current, new));
        if Arc::ptr_eq(&previous, current) {
            Ok(previous)
        } else {
            Err(previous)
        }
    }

    /// Atomically replace the reference with `f(reference)`, returning the
    /// new one.
    pub fn update(&self, mut f: impl FnMut(&Arc<T>) -> Arc<T>) -> Arc<T> {
        let mut current = self.get();
        loop {
            let new = f(&current);
            match self.compare_exchange(&current, Arc::clone(&new)) {
                Ok(_) => return new,
                Err(actual) => current = actual,
            }
        }
    }
}
