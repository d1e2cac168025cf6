//! Atomics facade: std by default, loom's model-checked types under `--features loom`.
//!
//! Slot cells use loom's closure-based access API in both builds, so every
//! slot access is a tracked event when running under the model checker.

#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::atomic::{AtomicU8, Ordering};
#[cfg(feature = "loom")]
pub(crate) use loom::sync::atomic::{AtomicU8, Ordering};

#[cfg(feature = "loom")]
pub(crate) use loom::cell::UnsafeCell;

#[cfg(not(feature = "loom"))]
#[derive(Debug)]
pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

#[cfg(not(feature = "loom"))]
impl<T> UnsafeCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(std::cell::UnsafeCell::new(value))
    }

    #[inline]
    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        f(self.0.get())
    }

    #[inline]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }
}
