//! Old generation: individually allocated blocks on an intrusive list.
//!
//! Every block is `HEADER_SIZE + payload` bytes from the system allocator.
//! [`OldBlock`] owns exactly one block until it is linked into [`OldGen`];
//! unlinking hands ownership back, so a swept block is released when its
//! `OldBlock` drops.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use hl_log::error;

use super::header::{GcHeader, Generation, HEADER_SIZE};
use crate::align::ALIGNMENT;
use crate::error::{Error, Result};

/// Owning handle to one old-generation block.
pub(crate) struct OldBlock {
    header: NonNull<GcHeader>,
}

impl OldBlock {
    fn layout(payload: usize) -> Result<Layout> {
        let total = HEADER_SIZE
            .checked_add(payload)
            .ok_or(Error::AllocationTooLarge {
                requested: payload,
                limit: isize::MAX as usize - HEADER_SIZE,
            })?;
        Layout::from_size_align(total, ALIGNMENT).map_err(|_| Error::AllocationTooLarge {
            requested: payload,
            limit: isize::MAX as usize - HEADER_SIZE,
        })
    }

    /// Allocates a block for `size` payload bytes with a fresh old header.
    ///
    /// `size` must already be rounded to the alignment unit.
    pub(crate) fn new(size: u32, age: u8) -> Result<Self> {
        let layout = Self::layout(size as usize)?;

        // SAFETY: layout has non-zero size (it always includes the header).
        let raw = unsafe { alloc::alloc(layout) };
        let Some(header) = NonNull::new(raw.cast::<GcHeader>()) else {
            error!("old generation: allocation of {} bytes failed", layout.size());
            return Err(Error::OutOfMemory {
                requested: layout.size(),
            });
        };

        // SAFETY: header points to fresh memory sized and aligned for a header.
        unsafe {
            header.write(GcHeader::new(size, age, Generation::Old));
        }
        Ok(OldBlock { header })
    }

    /// Copies a young object (header and payload) into a new old block.
    ///
    /// # Safety
    ///
    /// `src` must point to a valid header followed by its payload.
    pub(crate) unsafe fn copy_from(src: NonNull<GcHeader>) -> Result<Self> {
        let (size, age, marked) = unsafe {
            let h = src.as_ref();
            (h.size, h.age, h.marked)
        };
        let block = Self::new(size, age)?;
        unsafe {
            ptr::copy_nonoverlapping(
                GcHeader::payload(src).as_ptr(),
                block.payload().as_ptr(),
                size as usize,
            );
            (*block.header.as_ptr()).marked = marked;
        }
        Ok(block)
    }

    pub(crate) fn payload(&self) -> NonNull<u8> {
        GcHeader::payload(self.header)
    }

    fn total_size(&self) -> usize {
        // SAFETY: the block owns a live header.
        unsafe { self.header.as_ref().total_size() }
    }

    fn into_raw(self) -> NonNull<GcHeader> {
        let header = self.header;
        std::mem::forget(self);
        header
    }

    /// # Safety
    ///
    /// `header` must come from [`OldBlock::into_raw`] and not be owned
    /// elsewhere.
    unsafe fn from_raw(header: NonNull<GcHeader>) -> Self {
        OldBlock { header }
    }
}

impl Drop for OldBlock {
    fn drop(&mut self) {
        let total = self.total_size();
        // SAFETY: same size and alignment as the allocation in `new`.
        unsafe {
            let layout = Layout::from_size_align_unchecked(total, ALIGNMENT);
            alloc::dealloc(self.header.as_ptr().cast::<u8>(), layout);
        }
    }
}

/// Outcome of one sweep over the old list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepOutcome {
    pub(crate) freed_objects: u64,
    pub(crate) freed_bytes: usize,
}

/// The old-generation list and its byte accounting.
pub(crate) struct OldGen {
    head: *mut GcHeader,
    used_bytes: usize,
    objects: usize,
}

impl OldGen {
    pub(crate) const fn new() -> Self {
        OldGen {
            head: ptr::null_mut(),
            used_bytes: 0,
            objects: 0,
        }
    }

    /// Bytes in use, headers included.
    pub(crate) const fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub(crate) const fn len(&self) -> usize {
        self.objects
    }

    /// Prepends a block, taking ownership of it.
    pub(crate) fn push(&mut self, block: OldBlock) -> NonNull<u8> {
        self.used_bytes += block.total_size();
        self.objects += 1;

        let payload = block.payload();
        let header = block.into_raw();
        // SAFETY: the list now owns `header`.
        unsafe {
            (*header.as_ptr()).next = self.head;
        }
        self.head = header.as_ptr();
        payload
    }

    /// Iterates over the headers on the list, most recent first.
    pub(crate) fn iter(&self) -> OldIter<'_> {
        OldIter {
            cursor: self.head,
            _list: std::marker::PhantomData,
        }
    }

    /// Returns true if `addr` is the payload address of a block on the list.
    pub(crate) fn contains_payload(&self, addr: usize) -> bool {
        self.iter()
            .any(|h| GcHeader::payload(h).as_ptr().addr() == addr)
    }

    /// Clears the mark bit of every block.
    pub(crate) fn unmark_all(&mut self) {
        let mut cursor = self.head;
        while let Some(mut h) = NonNull::new(cursor) {
            // SAFETY: every node on the list is a live header we own.
            unsafe {
                h.as_mut().marked = false;
                cursor = h.as_ref().next;
            }
        }
    }

    /// Releases unmarked blocks and clears the mark on the rest.
    pub(crate) fn sweep(&mut self) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let mut link: *mut *mut GcHeader = &mut self.head;

        // SAFETY: `link` always points either at `self.head` or at the `next`
        // field of a live node, and each node is owned by the list.
        unsafe {
            while let Some(mut h) = NonNull::new(*link) {
                if h.as_ref().marked {
                    h.as_mut().marked = false;
                    link = &mut (*h.as_ptr()).next;
                } else {
                    *link = h.as_ref().next;
                    let block = OldBlock::from_raw(h);
                    let bytes = block.total_size();
                    self.used_bytes -= bytes;
                    self.objects -= 1;
                    outcome.freed_bytes += bytes;
                    outcome.freed_objects += 1;
                    drop(block);
                }
            }
        }

        outcome
    }

    /// Sums the list by walking it; used to check the byte counter.
    #[cfg(test)]
    pub(crate) fn walk_bytes(&self) -> usize {
        self.iter()
            .map(|h| unsafe { h.as_ref().total_size() })
            .sum()
    }
}

impl Drop for OldGen {
    fn drop(&mut self) {
        let mut cursor = self.head;
        while let Some(h) = NonNull::new(cursor) {
            // SAFETY: each node is owned by the list and visited once.
            unsafe {
                cursor = h.as_ref().next;
                drop(OldBlock::from_raw(h));
            }
        }
        self.head = ptr::null_mut();
    }
}

pub(crate) struct OldIter<'a> {
    cursor: *mut GcHeader,
    _list: std::marker::PhantomData<&'a OldGen>,
}

impl Iterator for OldIter<'_> {
    type Item = NonNull<GcHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        let h = NonNull::new(self.cursor)?;
        // SAFETY: the borrowed list keeps every node alive.
        self.cursor = unsafe { h.as_ref().next };
        Some(h)
    }
}
