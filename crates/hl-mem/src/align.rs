//! Alignment and size rounding shared by the collector and the arena.

/// Alignment unit for every GC payload and arena allocation.
pub const ALIGNMENT: usize = 8;

/// Granularity arena chunks are rounded up to.
pub const PAGE_SIZE: usize = 4096;

/// Alignment of the young-generation buffer (one cache line).
pub const CACHE_LINE: usize = 64;

/// Rounds `n` up to the next multiple of `align`.
///
/// Returns `None` on overflow. `align` must be a power of two.
///
/// ```
/// use hl_mem::align::align_up;
///
/// assert_eq!(align_up(13, 8), Some(16));
/// assert_eq!(align_up(16, 8), Some(16));
/// assert_eq!(align_up(usize::MAX, 8), None);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(n: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match n.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Rounds an allocation request to [`ALIGNMENT`].
#[inline(always)]
#[must_use]
pub const fn round_size(size: usize) -> Option<usize> {
    align_up(size, ALIGNMENT)
}

/// Rounds a chunk capacity to [`PAGE_SIZE`].
#[inline]
#[must_use]
pub const fn round_to_page(size: usize) -> Option<usize> {
    align_up(size, PAGE_SIZE)
}
