//! Zero-initialized `f32` buffers aligned to the vector width.
//!
//! The AVX2 kernel uses aligned loads and stores, so input and output
//! buffers for the vector paths must start on a [`LANE_ALIGN`] boundary.
//! `Vec<f32>` only guarantees 4-byte alignment.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::config::LANE_ALIGN;
use crate::error::SqrtError;

/// Fixed-length `f32` buffer starting on a [`LANE_ALIGN`]-byte boundary.
pub struct AlignedBuffer {
    ptr: NonNull<f32>,
    len: usize,
}

// SAFETY: AlignedBuffer uniquely owns its allocation.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate `len` zeroed floats.
    ///
    /// An empty buffer performs no allocation.
    ///
    /// # Errors
    ///
    /// Returns [`SqrtError::Allocation`] if the size overflows a layout or
    /// the allocator returns null.
    pub fn zeroed(len: usize) -> Result<Self, SqrtError> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let layout = Self::layout(len)?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<f32>()).ok_or(SqrtError::Allocation {
            len,
            align: LANE_ALIGN,
        })?;
        log::debug!("allocated {len} floats at {:p} (align {LANE_ALIGN})", ptr.as_ptr());
        Ok(Self { ptr, len })
    }

    /// Allocate and copy `values` into aligned storage.
    ///
    /// # Errors
    ///
    /// Same as [`AlignedBuffer::zeroed`].
    pub fn from_slice(values: &[f32]) -> Result<Self, SqrtError> {
        let mut buf = Self::zeroed(values.len())?;
        buf.copy_from_slice(values);
        Ok(buf)
    }

    /// Reset every element to zero.
    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Whether the data pointer sits on a [`LANE_ALIGN`] boundary.
    ///
    /// Always true for non-empty buffers.
    pub fn is_aligned(&self) -> bool {
        is_lane_aligned(self)
    }

    fn layout(len: usize) -> Result<Layout, SqrtError> {
        len.checked_mul(std::mem::size_of::<f32>())
            .and_then(|size| Layout::from_size_align(size, LANE_ALIGN).ok())
            .ok_or(SqrtError::Allocation {
                len,
                align: LANE_ALIGN,
            })
    }
}

/// Whether a slice starts on a [`LANE_ALIGN`] boundary.
pub fn is_lane_aligned(slice: &[f32]) -> bool {
    slice.as_ptr().addr() % LANE_ALIGN == 0
}

impl Deref for AlignedBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        // SAFETY: ptr is valid for len initialized floats (or dangling with len 0).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        // SAFETY: unique ownership; ptr is valid for len floats.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        if let Ok(layout) = Self::layout(self.len) {
            // SAFETY: allocated in `zeroed` with this exact layout.
            unsafe { dealloc(self.ptr.as_ptr().cast::<u8>(), layout) };
        }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
