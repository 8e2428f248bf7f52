//! Allocation header prepended to every collector-managed object.

use std::fmt;
use std::ptr::{self, NonNull};

use crate::align::ALIGNMENT;

/// Which generation an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Generation {
    /// Bump-allocated young buffer.
    Young = 0,
    /// Individually allocated old-generation block.
    Old = 1,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Young => f.write_str("young"),
            Generation::Old => f.write_str("old"),
        }
    }
}

/// Object header.
///
/// The payload starts immediately after the header. `next` is only
/// meaningful for old-generation objects, where it links the old list.
#[repr(C, align(8))]
pub(crate) struct GcHeader {
    /// Payload size in bytes, a multiple of [`ALIGNMENT`].
    pub(crate) size: u32,
    /// Minor collections survived.
    pub(crate) age: u8,
    pub(crate) marked: bool,
    pub(crate) generation: Generation,
    _pad: u8,
    pub(crate) next: *mut GcHeader,
}

/// Size of [`GcHeader`] in bytes; payloads start this far past the header.
pub const HEADER_SIZE: usize = std::mem::size_of::<GcHeader>();

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);

impl GcHeader {
    pub(crate) const fn new(size: u32, age: u8, generation: Generation) -> Self {
        GcHeader {
            size,
            age,
            marked: false,
            generation,
            _pad: 0,
            next: ptr::null_mut(),
        }
    }

    /// Header plus payload.
    #[inline(always)]
    pub(crate) const fn total_size(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }

    /// Returns the payload address of the object starting at `header`.
    #[inline(always)]
    pub(crate) fn payload(header: NonNull<GcHeader>) -> NonNull<u8> {
        // SAFETY: every header is followed by its payload inside the same
        // allocation, so stepping over one header stays in bounds.
        unsafe { header.cast::<u8>().add(HEADER_SIZE) }
    }

    /// Recovers the header from a payload address.
    ///
    /// # Safety
    ///
    /// `payload` must have been produced by [`GcHeader::payload`] for an
    /// object that is still allocated.
    #[inline(always)]
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<GcHeader> {
        unsafe { payload.sub(HEADER_SIZE).cast::<GcHeader>() }
    }
}

/// Handle to a collector-managed payload.
///
/// A `GcPtr` is a plain address. Young objects move during a minor
/// collection; use [`Gc::forward`](crate::gc::Gc::forward) to follow them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcPtr(NonNull<u8>);

impl GcPtr {
    #[inline(always)]
    pub(crate) const fn new(payload: NonNull<u8>) -> Self {
        GcPtr(payload)
    }

    /// Rebuilds a handle from an address previously obtained from
    /// [`GcPtr::as_ptr`]. Returns `None` for null.
    #[must_use]
    pub fn from_raw(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(GcPtr)
    }

    /// Returns the payload address.
    #[inline(always)]
    #[must_use]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    #[inline(always)]
    pub(crate) const fn as_non_null(self) -> NonNull<u8> {
        self.0
    }

    #[inline(always)]
    pub(crate) fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

impl fmt::Debug for GcPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcPtr({:p})", self.0)
    }
}

/// Snapshot of an object's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Payload size after rounding.
    pub size: usize,
    /// Minor collections survived.
    pub age: u8,
    /// Current mark bit.
    pub marked: bool,
    /// Generation the header claims.
    pub generation: Generation,
}

impl ObjectInfo {
    pub(crate) fn from_header(header: &GcHeader) -> Self {
        ObjectInfo {
            size: header.size as usize,
            age: header.age,
            marked: header.marked,
            generation: header.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(std::mem::align_of::<GcHeader>(), 8);
        assert_eq!(HEADER_SIZE % ALIGNMENT, 0);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(HEADER_SIZE, 16);
    }

    #[test]
    fn test_payload_round_trip() {
        let mut header = GcHeader::new(8, 0, Generation::Young);
        let header_ptr = NonNull::from(&mut header);
        let payload = GcHeader::payload(header_ptr);
        assert_eq!(payload.as_ptr().addr(), header_ptr.as_ptr().addr() + HEADER_SIZE);
        let back = unsafe { GcHeader::from_payload(payload) };
        assert_eq!(back, header_ptr);
    }

    #[test]
    fn test_total_size() {
        let header = GcHeader::new(24, 1, Generation::Old);
        assert_eq!(header.total_size(), HEADER_SIZE + 24);
    }

    #[test]
    fn test_gc_ptr_from_raw() {
        assert!(GcPtr::from_raw(std::ptr::null_mut()).is_none());
        let mut byte = 0u8;
        let ptr = GcPtr::from_raw(&mut byte).unwrap();
        assert_eq!(ptr.as_ptr(), &mut byte as *mut u8);
    }

    #[test]
    fn test_generation_display() {
        assert_eq!(Generation::Young.to_string(), "young");
        assert_eq!(Generation::Old.to_string(), "old");
    }
}
