//! Young generation: a fixed, cache-aligned bump buffer.
//!
//! Objects are laid out back to back as `header | payload` from `base` to
//! `top` with no gaps. A minor collection walks that range in allocation
//! order, copies survivors into a scratch buffer of the same capacity (or
//! promotes them), then copies the survivors back to `base`.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use hl_log::{trace, warn};

use super::header::{GcHeader, GcPtr, Generation, HEADER_SIZE};
use super::old::{OldBlock, OldGen};
use crate::align::CACHE_LINE;
use crate::error::{Error, Result};

/// Survivor relocation: pre-collection payload address and new handle.
pub(crate) type Forwarding = (usize, GcPtr);

/// Counts produced by one minor collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MinorOutcome {
    pub(crate) collected: u64,
    pub(crate) promoted: u64,
    pub(crate) survived: u64,
    /// Survivors that should have been promoted but stayed young because
    /// the old block could not be allocated.
    pub(crate) promotion_failures: u64,
}

/// Owns the young buffer and the survivor scratch buffer.
pub(crate) struct YoungGen {
    base: NonNull<u8>,
    scratch: NonNull<u8>,
    /// Bump offset from `base`.
    top: usize,
    capacity: usize,
}

impl YoungGen {
    fn layout(capacity: usize) -> Result<Layout> {
        Layout::from_size_align(capacity, CACHE_LINE).map_err(|_| Error::AllocationTooLarge {
            requested: capacity,
            limit: isize::MAX as usize,
        })
    }

    fn alloc_buffer(layout: Layout) -> Result<NonNull<u8>> {
        // SAFETY: capacity is validated non-zero by `GcConfig::validate`.
        let raw = unsafe { alloc::alloc(layout) };
        NonNull::new(raw).ok_or_else(|| {
            hl_log::error!("young generation: buffer of {} bytes failed", layout.size());
            Error::ChunkAllocationFailed {
                size: layout.size(),
            }
        })
    }

    pub(crate) fn new(capacity: usize) -> Result<Self> {
        let layout = Self::layout(capacity)?;
        let base = Self::alloc_buffer(layout)?;
        let scratch = match Self::alloc_buffer(layout) {
            Ok(scratch) => scratch,
            Err(e) => {
                // SAFETY: `base` was allocated with `layout` just above.
                unsafe { alloc::dealloc(base.as_ptr(), layout) };
                return Err(e);
            }
        };

        Ok(YoungGen {
            base,
            scratch,
            top: 0,
            capacity,
        })
    }

    #[inline(always)]
    pub(crate) const fn used(&self) -> usize {
        self.top
    }

    #[inline(always)]
    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bump-allocates an object of `size` payload bytes, or returns `None`
    /// if the buffer lacks room.
    ///
    /// `size` must already be rounded to the alignment unit.
    #[inline(always)]
    pub(crate) fn try_alloc(&mut self, size: u32) -> Option<NonNull<u8>> {
        let total = HEADER_SIZE + size as usize;
        if total > self.capacity - self.top {
            return None;
        }

        // SAFETY: `top + total <= capacity`, so the header and payload lie
        // inside the young buffer. The offset is a multiple of 8.
        unsafe {
            let header = self.base.add(self.top).cast::<GcHeader>();
            header.write(GcHeader::new(size, 0, Generation::Young));
            self.top += total;
            Some(GcHeader::payload(header))
        }
    }

    /// Iterates over the headers in allocation order.
    pub(crate) fn iter(&self) -> YoungIter<'_> {
        YoungIter {
            young: self,
            offset: 0,
        }
    }

    /// Finds the header whose payload starts exactly at `addr`.
    pub(crate) fn find(&self, addr: usize) -> Option<NonNull<GcHeader>> {
        let base = self.base.as_ptr().addr();
        if addr < base + HEADER_SIZE || addr >= base + self.top {
            return None;
        }
        self.iter()
            .find(|h| GcHeader::payload(*h).as_ptr().addr() == addr)
    }

    pub(crate) fn unmark_all(&mut self) {
        let mut offset = 0;
        while offset < self.top {
            // SAFETY: `offset` always lands on a header inside `base..top`.
            unsafe {
                let header = self.base.add(offset).cast::<GcHeader>().as_ptr();
                (*header).marked = false;
                offset += (*header).total_size();
            }
        }
    }

    /// Drops everything in the buffer.
    pub(crate) fn reset(&mut self) {
        self.top = 0;
        self.poison_tail();
    }

    /// Runs a minor collection.
    ///
    /// Unmarked objects are dropped. Marked objects age by one; those
    /// reaching `tenuring_age` move to `old`, the rest are compacted to the
    /// start of the buffer. `forwarding` receives one entry per survivor,
    /// sorted by pre-collection address.
    pub(crate) fn collect(
        &mut self,
        old: &mut OldGen,
        tenuring_age: u8,
        forwarding: &mut Vec<Forwarding>,
    ) -> MinorOutcome {
        let mut outcome = MinorOutcome::default();
        let mut survivors = 0usize;
        let mut offset = 0usize;

        forwarding.clear();

        while offset < self.top {
            // SAFETY: `offset` lands on a header inside `base..top`; the
            // buffer is tiled by header+payload blocks.
            let header = unsafe { self.base.add(offset).cast::<GcHeader>() };
            let (total, marked) = unsafe {
                let h = header.as_ref();
                (h.total_size(), h.marked)
            };
            let from = GcHeader::payload(header).as_ptr().addr();
            offset += total;

            if !marked {
                outcome.collected += 1;
                continue;
            }

            let age = unsafe {
                let h = &mut *header.as_ptr();
                h.age = h.age.saturating_add(1);
                h.age
            };

            if age >= tenuring_age {
                // SAFETY: `header` is a live young object.
                match unsafe { OldBlock::copy_from(header) } {
                    Ok(block) => {
                        let payload = old.push(block);
                        forwarding.push((from, GcPtr::new(payload)));
                        outcome.promoted += 1;
                        trace!("promoted {:#x} (age {})", from, age);
                        continue;
                    }
                    Err(e) => {
                        warn!("promotion of {:#x} failed, keeping it young: {}", from, e);
                        outcome.promotion_failures += 1;
                    }
                }
            }

            // SAFETY: survivors never exceed the bytes scanned so far, and
            // the scratch buffer has the same capacity as the young buffer.
            unsafe {
                ptr::copy_nonoverlapping(
                    header.as_ptr().cast::<u8>(),
                    self.scratch.as_ptr().add(survivors),
                    total,
                );
                let to = self.base.add(survivors + HEADER_SIZE);
                forwarding.push((from, GcPtr::new(to)));
            }
            survivors += total;
            outcome.survived += 1;
        }

        // SAFETY: both buffers hold at least `survivors` bytes.
        unsafe {
            ptr::copy_nonoverlapping(self.scratch.as_ptr(), self.base.as_ptr(), survivors);
        }
        self.top = survivors;
        self.poison_tail();

        outcome
    }

    #[cfg(feature = "gc-debug")]
    fn poison_tail(&mut self) {
        // SAFETY: `top..capacity` is inside the buffer and holds no objects.
        unsafe {
            ptr::write_bytes(self.base.as_ptr().add(self.top), 0xDD, self.capacity - self.top);
        }
    }

    #[cfg(not(feature = "gc-debug"))]
    #[inline(always)]
    fn poison_tail(&mut self) {}

    /// Checks that `base..top` is exactly tiled by objects; returns the sum
    /// of their sizes.
    #[cfg(test)]
    pub(crate) fn tiled_bytes(&self) -> usize {
        self.iter()
            .map(|h| unsafe { h.as_ref().total_size() })
            .sum()
    }
}

impl Drop for YoungGen {
    fn drop(&mut self) {
        // SAFETY: both buffers were allocated with this layout in `new`.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.capacity, CACHE_LINE);
            alloc::dealloc(self.base.as_ptr(), layout);
            alloc::dealloc(self.scratch.as_ptr(), layout);
        }
    }
}

pub(crate) struct YoungIter<'a> {
    young: &'a YoungGen,
    offset: usize,
}

impl Iterator for YoungIter<'_> {
    type Item = NonNull<GcHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.young.top {
            return None;
        }
        // SAFETY: `offset` lands on a header inside `base..top`.
        unsafe {
            let header = self.young.base.add(self.offset).cast::<GcHeader>();
            self.offset += header.as_ref().total_size();
            Some(header)
        }
    }
}
