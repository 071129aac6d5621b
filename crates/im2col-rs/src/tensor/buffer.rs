//! Aligned, owned `f32` storage handed between pipeline stages.

use std::alloc::{self, Layout};
use std::fmt;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::error::{ConvError, ConvResult};

/// Alignment used by the cross-validation driver for every buffer it requests.
pub const DEFAULT_ALIGN: usize = 64;

/// Capability the core requests buffers from.
///
/// Buffers are always zero-initialised; a failed request is fatal for the operation that made
/// it and must abort the pipeline.
pub trait BufferAllocator {
    fn allocate_zeroed(&self, len: usize) -> ConvResult<AlignedBuffer>;
}

/// Heap allocator returning buffers aligned to a fixed power-of-two boundary.
#[derive(Debug, Clone, Copy)]
pub struct AlignedAllocator {
    align: usize,
}

impl AlignedAllocator {
    /// Panics if `align` is not a power of two or is smaller than `f32`'s alignment.
    pub fn new(align: usize) -> Self {
        assert!(
            align.is_power_of_two() && align >= align_of::<f32>(),
            "alignment {align} must be a power of two no smaller than 4"
        );
        Self { align }
    }
}

impl Default for AlignedAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ALIGN)
    }
}

impl BufferAllocator for AlignedAllocator {
    fn allocate_zeroed(&self, len: usize) -> ConvResult<AlignedBuffer> {
        AlignedBuffer::zeroed(len, self.align)
    }
}

/// Owned, aligned, zero-initialised `f32` buffer.
///
/// Memory is released when the buffer is dropped, so an early return after a failed sibling
/// allocation never leaks or double-frees.
pub struct AlignedBuffer {
    ptr: NonNull<f32>,
    len: usize,
    align: usize,
}

// Safety: the buffer uniquely owns its allocation, like `Vec<f32>`.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    pub fn zeroed(len: usize, align: usize) -> ConvResult<Self> {
        if !align.is_power_of_two() || align < align_of::<f32>() {
            return Err(ConvError::Allocation {
                elements: len,
                align,
            });
        }
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
                align,
            });
        }
        let layout = Self::layout(len, align)?;
        // Safety: `layout` has a non-zero size because `len > 0`.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<f32>()).ok_or(ConvError::Allocation {
            elements: len,
            align,
        })?;
        Ok(Self { ptr, len, align })
    }

    /// Allocates a buffer and copies `values` into it.
    pub fn from_slice(values: &[f32], align: usize) -> ConvResult<Self> {
        let mut buffer = Self::zeroed(values.len(), align)?;
        buffer.copy_from_slice(values);
        Ok(buffer)
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn as_slice(&self) -> &[f32] {
        // Safety: `ptr` is valid for `len` initialised floats (or dangling with `len == 0`).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        // Safety: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn layout(len: usize, align: usize) -> ConvResult<Layout> {
        let bytes = len
            .checked_mul(size_of::<f32>())
            .ok_or(ConvError::Overflow("buffer byte size"))?;
        Layout::from_size_align(bytes, align).map_err(|_| ConvError::Allocation {
            elements: len,
            align,
        })
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        if let Ok(layout) = Self::layout(self.len, self.align) {
            // Safety: the pointer was returned by `alloc_zeroed` with this exact layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), layout) };
        }
    }
}

impl Deref for AlignedBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        self.as_mut_slice()
    }
}

impl Clone for AlignedBuffer {
    /// Panics if the allocation fails, mirroring `Vec::clone`.
    fn clone(&self) -> Self {
        match Self::from_slice(self.as_slice(), self.align) {
            Ok(buffer) => buffer,
            Err(err) => panic!("{err}"),
        }
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .field("align", &self.align)
            .finish()
    }
}
