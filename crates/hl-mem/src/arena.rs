//! Region allocator for phase-scoped compiler data.
//!
//! An [`Arena`] owns a chain of chunks and bump-allocates from the newest
//! one. Nothing is freed individually: [`Arena::reset`] drops every chunk
//! but the first, [`Arena::restore`] drops everything allocated since a
//! [`Savepoint`], and dropping the arena releases all of it.
//!
//! Allocation takes `&self`, so savepoints can borrow the arena while
//! allocations continue. `reset` and `free` need `&mut self` / `self`, so a
//! savepoint can never be used after either of them.
//!
//! # Examples
//!
//! ```
//! use hl_mem::arena::Arena;
//!
//! let arena = Arena::new(4096).unwrap();
//!
//! let value = arena.alloc(42u32).unwrap();
//! unsafe { assert_eq!(*value.as_ptr(), 42) };
//!
//! let sp = arena.save();
//! arena.alloc_bytes(100).unwrap();
//! arena.restore(sp).unwrap();
//!
//! assert_eq!(arena.stats().allocations, 2);
//! ```
//!
//! Speculative parsing with automatic rollback:
//!
//! ```
//! use hl_mem::arena::Arena;
//!
//! let arena = Arena::new(4096).unwrap();
//! let before = arena.stats().used_bytes;
//!
//! let parsed: Option<()> = arena.speculate(|a| {
//!     a.alloc_str("tentative").ok()?;
//!     None
//! });
//!
//! assert!(parsed.is_none());
//! assert_eq!(arena.stats().used_bytes, before);
//! ```

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};

use hl_log::{error, info, trace, warn};

use crate::align::{ALIGNMENT, align_up, round_size, round_to_page};
use crate::error::{Error, Result};

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// One contiguous block of arena memory.
struct Chunk {
    start: NonNull<u8>,
    /// Bump offset from `start`.
    top: Cell<usize>,
    capacity: usize,
    /// Arena-local creation number; never reused.
    serial: u64,
    /// Bumped by every restore into this chunk.
    epoch: u64,
    /// Restore targets, oldest first. An entry is dropped once a later
    /// restore goes at least as low, so targets strictly increase.
    rewinds: Vec<Rewind>,
}

#[derive(Debug, Clone, Copy)]
struct Rewind {
    epoch: u64,
    top: usize,
}

impl Chunk {
    fn new(capacity: usize, serial: u64) -> Result<Self> {
        let layout = Layout::from_size_align(capacity, ALIGNMENT).map_err(|_| {
            Error::AllocationTooLarge {
                requested: capacity,
                limit: isize::MAX as usize,
            }
        })?;

        // SAFETY: capacity is at least one page.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(start) = NonNull::new(raw) else {
            error!("arena: chunk of {} bytes failed", capacity);
            return Err(Error::ChunkAllocationFailed { size: capacity });
        };

        Ok(Chunk {
            start,
            top: Cell::new(0),
            capacity,
            serial,
            epoch: 0,
            rewinds: Vec::new(),
        })
    }

    #[inline(always)]
    fn try_alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let base = self.start.as_ptr().addr();
        let top = self.top.get();
        let offset = align_up(base + top, align)? - base;
        let end = offset.checked_add(size)?;
        if end > self.capacity {
            return None;
        }
        self.top.set(end);
        // SAFETY: `offset + size <= capacity`.
        Some(unsafe { self.start.add(offset) })
    }

    /// Moves the bump offset back to `top` and records the rewind.
    fn rewind(&mut self, top: usize) {
        self.epoch += 1;
        while self.rewinds.last().is_some_and(|r| r.top >= top) {
            self.rewinds.pop();
        }
        self.rewinds.push(Rewind {
            epoch: self.epoch,
            top,
        });
        self.top.set(top);
    }

    /// True if a restore after `epoch` went below `top`. Memory above such
    /// a target may have been handed out again.
    fn rewound_below(&self, epoch: u64, top: usize) -> bool {
        let first_later = self.rewinds.partition_point(|r| r.epoch <= epoch);
        self.rewinds
            .get(first_later)
            .is_some_and(|r| r.top < top)
    }

    fn clear(&mut self) {
        self.top.set(0);
        self.epoch = 0;
        self.rewinds.clear();
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: same layout as in `Chunk::new`.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.capacity, ALIGNMENT);
            alloc::dealloc(self.start.as_ptr(), layout);
        }
    }
}

/// Arena allocation statistics.
///
/// `allocations` and `bytes_allocated` count since creation or the last
/// [`Arena::reset`]; the rest describe the chunks right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Allocation calls served.
    pub allocations: usize,
    /// Bytes handed out, after rounding.
    pub bytes_allocated: usize,
    /// Chunks currently attached.
    pub chunk_count: usize,
    /// Sum of chunk capacities.
    pub total_capacity: usize,
    /// Sum of chunk bump offsets, alignment padding included.
    pub used_bytes: usize,
}

impl fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocs={}  bytes={} KB  chunks={}  cap={} KB",
            self.allocations,
            self.bytes_allocated / 1024,
            self.chunk_count,
            self.total_capacity / 1024
        )
    }
}

/// A saved allocation position.
///
/// Borrows the arena it was taken from, so it cannot outlive it or survive
/// a reset. Restoring consumes it.
#[derive(Debug)]
#[must_use = "a savepoint does nothing unless restored"]
pub struct Savepoint<'a> {
    arena_id: u64,
    chunk: usize,
    serial: u64,
    epoch: u64,
    top: usize,
    _arena: PhantomData<&'a Arena>,
}

/// Bump allocator over a chain of chunks.
///
/// Single-threaded: an arena may move between threads but cannot be shared.
pub struct Arena {
    id: u64,
    /// Oldest first; the last chunk is the head.
    chunks: RefCell<Vec<Chunk>>,
    next_serial: Cell<u64>,
    allocations: Cell<usize>,
    bytes_allocated: Cell<usize>,
}

// SAFETY: the arena exclusively owns its chunks; the `Cell`s keep it !Sync.
unsafe impl Send for Arena {}

impl Arena {
    /// Creates an arena whose first chunk holds at least `initial_size`
    /// bytes, rounded up to the page size.
    pub fn new(initial_size: usize) -> Result<Self> {
        let capacity = round_to_page(initial_size.max(1)).ok_or(Error::AllocationTooLarge {
            requested: initial_size,
            limit: isize::MAX as usize,
        })?;
        let first = Chunk::new(capacity, 0)?;

        Ok(Arena {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            chunks: RefCell::new(vec![first]),
            next_serial: Cell::new(1),
            allocations: Cell::new(0),
            bytes_allocated: Cell::new(0),
        })
    }

    /// Allocates `size` bytes aligned to 8. Zero is treated as 8.
    ///
    /// The memory is uninitialized and stays valid until the arena is
    /// reset, restored to an earlier savepoint or dropped.
    #[inline]
    pub fn alloc_bytes(&self, size: usize) -> Result<NonNull<u8>> {
        self.alloc_raw(size, ALIGNMENT)
    }

    /// Moves `value` into the arena.
    ///
    /// The value's destructor never runs.
    #[inline]
    pub fn alloc<T>(&self, value: T) -> Result<NonNull<T>> {
        let ptr = self
            .alloc_raw(mem::size_of::<T>(), mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: fresh memory, sized and aligned for `T`.
        unsafe { ptr.write(value) };
        Ok(ptr)
    }

    /// Allocates `size` zeroed bytes.
    pub fn alloc_zeroed(&self, size: usize) -> Result<NonNull<u8>> {
        let ptr = self.alloc_bytes(size)?;
        // SAFETY: at least `size` bytes were just reserved.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Copies `s` into the arena followed by a NUL byte.
    pub fn alloc_str(&self, s: &str) -> Result<NonNull<u8>> {
        self.alloc_nul_terminated(s.as_bytes())
    }

    /// Copies at most `max_len` bytes of `s` followed by a NUL byte.
    ///
    /// The cut is made on a byte boundary, not a character boundary.
    pub fn alloc_str_bounded(&self, s: &str, max_len: usize) -> Result<NonNull<u8>> {
        let bytes = s.as_bytes();
        self.alloc_nul_terminated(&bytes[..bytes.len().min(max_len)])
    }

    fn alloc_nul_terminated(&self, bytes: &[u8]) -> Result<NonNull<u8>> {
        let len = bytes.len();
        let ptr = self.alloc_bytes(len + 1)?;
        // SAFETY: `len + 1` bytes reserved; the source is a distinct slice.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), len);
            ptr.as_ptr().add(len).write(0);
        }
        Ok(ptr)
    }

    #[inline(always)]
    fn alloc_raw(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let align = align.max(ALIGNMENT);
        let size = round_size(size.max(1)).ok_or(Error::AllocationTooLarge {
            requested: size,
            limit: isize::MAX as usize,
        })?;

        let fast = self
            .chunks
            .borrow()
            .last()
            .and_then(|head| head.try_alloc(size, align));
        let ptr = match fast {
            Some(ptr) => ptr,
            None => self.grow(size, align)?,
        };

        self.allocations.set(self.allocations.get() + 1);
        self.bytes_allocated.set(self.bytes_allocated.get() + size);
        Ok(ptr)
    }

    /// Attaches a chunk of `max(needed, 2 * head capacity)` bytes and
    /// allocates from it.
    #[cold]
    #[inline(never)]
    fn grow(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let too_large = Error::AllocationTooLarge {
            requested: size,
            limit: isize::MAX as usize,
        };
        let needed = size.checked_add(align - ALIGNMENT).ok_or(too_large.clone())?;

        let mut chunks = self.chunks.borrow_mut();
        let doubled = chunks
            .last()
            .map_or(0, |head| head.capacity.saturating_mul(2));
        let capacity = round_to_page(needed.max(doubled)).ok_or(too_large)?;

        let serial = self.next_serial.get();
        let chunk = Chunk::new(capacity, serial)?;
        self.next_serial.set(serial + 1);

        trace!("arena {}: chunk #{} of {} bytes", self.id, serial, capacity);

        let ptr = chunk.try_alloc(size, align);
        chunks.push(chunk);
        ptr.ok_or(Error::ChunkAllocationFailed { size: capacity })
    }

    /// Drops every chunk except the first and rewinds the first.
    ///
    /// Also clears the allocation counters.
    pub fn reset(&mut self) {
        let chunks = self.chunks.get_mut();
        chunks.truncate(1);
        if let Some(first) = chunks.first_mut() {
            first.clear();
        }
        self.allocations.set(0);
        self.bytes_allocated.set(0);
    }

    /// Releases every chunk. Same as dropping the arena.
    pub fn free(self) {
        drop(self);
    }

    /// Records the current allocation position.
    pub fn save(&self) -> Savepoint<'_> {
        let chunks = self.chunks.borrow();
        let chunk = chunks.len() - 1;
        let head = &chunks[chunk];
        Savepoint {
            arena_id: self.id,
            chunk,
            serial: head.serial,
            epoch: head.epoch,
            top: head.top.get(),
            _arena: PhantomData,
        }
    }

    /// Drops everything allocated since `savepoint` was taken.
    ///
    /// Chunks attached after the savepoint's chunk are released and that
    /// chunk's bump offset is rewound. Fails with [`Error::StaleSavepoint`]
    /// if the savepoint belongs to another arena or its chunk has since
    /// been released or rewound past it.
    pub fn restore(&self, savepoint: Savepoint<'_>) -> Result<()> {
        let mut chunks = self.chunks.borrow_mut();

        let valid = savepoint.arena_id == self.id
            && chunks.get(savepoint.chunk).is_some_and(|c| {
                c.serial == savepoint.serial
                    && c.top.get() >= savepoint.top
                    && !c.rewound_below(savepoint.epoch, savepoint.top)
            });
        if !valid {
            warn!("arena {}: rejecting stale savepoint", self.id);
            return Err(Error::StaleSavepoint);
        }

        chunks.truncate(savepoint.chunk + 1);
        chunks[savepoint.chunk].rewind(savepoint.top);
        Ok(())
    }

    /// Runs `f`, rolling back its allocations if it returns `None`.
    pub fn speculate<R>(&self, f: impl FnOnce(&Self) -> Option<R>) -> Option<R> {
        let savepoint = self.save();
        let result = f(self);
        if result.is_none()
            && let Err(e) = self.restore(savepoint)
        {
            warn!("arena {}: speculation rollback failed: {}", self.id, e);
        }
        result
    }

    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let chunks = self.chunks.borrow();
        ArenaStats {
            allocations: self.allocations.get(),
            bytes_allocated: self.bytes_allocated.get(),
            chunk_count: chunks.len(),
            total_capacity: chunks.iter().map(|c| c.capacity).sum(),
            used_bytes: chunks.iter().map(|c| c.top.get()).sum(),
        }
    }

    /// Writes a one-line report tagged with `name` at info level.
    ///
    /// The logger starts at warn; enable info with `HL_LOG=info` plus
    /// [`hl_log::init_from_env`], or with [`hl_log::set_level`].
    pub fn log_stats(&self, name: &str) {
        info!("[Arena:{}] {}", name, self.stats());
    }

    /// Bump offset of the head chunk.
    #[cfg(test)]
    pub(crate) fn head_top(&self) -> usize {
        self.chunks.borrow().last().map_or(0, |c| c.top.get())
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("stats", &self.stats())
            .finish()
    }
}
