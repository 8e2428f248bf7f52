//! Generational garbage collector for the runtime heap.
//!
//! New objects are bump-allocated in a fixed young buffer. When it fills, a
//! minor collection copies marked objects back to the start of the buffer
//! and promotes those that have survived `tenuring_age` collections into the
//! old generation. Old objects never move; a mark-and-sweep major collection
//! releases unmarked ones once old usage crosses `old_threshold`.
//!
//! The collector does not trace. The runtime finds its roots, walks the
//! object graph and calls [`Gc::mark`] on every reachable object before
//! calling [`Gc::sweep`].
//!
//! # Example
//!
//! ```
//! use hl_mem::config::GcConfig;
//! use hl_mem::gc::{Gc, Generation};
//!
//! let mut gc = Gc::new(GcConfig::default()).unwrap();
//! let obj = gc.alloc(24).unwrap();
//! unsafe { gc.mark(obj) };
//!
//! gc.sweep();
//! let obj = gc.forward(obj).unwrap();
//! assert_eq!(gc.generation_of(obj), Some(Generation::Young));
//!
//! gc.sweep();
//! let obj = gc.forward(obj).unwrap();
//! assert_eq!(gc.generation_of(obj), Some(Generation::Old));
//! ```

mod header;
mod old;
mod stats;
mod young;

use std::ptr::{self, NonNull};

use hl_log::{debug, info, warn};

pub use header::{GcPtr, Generation, ObjectInfo, HEADER_SIZE};
pub use stats::GcStats;

use crate::align::round_size;
use crate::config::{GcConfig, PretenurePolicy};
use crate::error::{Error, Result};
use header::GcHeader;
use old::{OldBlock, OldGen};
use young::{Forwarding, YoungGen};

/// Largest payload a header can describe.
pub const MAX_OBJECT_SIZE: usize = (u32::MAX as usize) & !(crate::align::ALIGNMENT - 1);

/// Monotonic counters; live sizes are read from the generations.
#[derive(Debug, Default)]
struct Counters {
    total_allocs: u64,
    minor_collections: u64,
    major_collections: u64,
    promoted: u64,
    collected_young: u64,
    collected_old: u64,
}

/// A generational collector instance.
///
/// Each `Gc` owns its young buffer and old list outright. It can be moved
/// to another thread but not shared; use one instance per thread.
pub struct Gc {
    config: GcConfig,
    young: YoungGen,
    old: OldGen,
    counters: Counters,
    /// Survivors of the last minor collection, sorted by old address.
    forwarding: Vec<Forwarding>,
}

// SAFETY: all memory reachable from a `Gc` is owned by it exclusively; no
// handle it gives out keeps shared state alive.
unsafe impl Send for Gc {}

impl Gc {
    /// Creates a collector with its own young buffer.
    pub fn new(config: GcConfig) -> Result<Self> {
        config.validate()?;
        let young = YoungGen::new(config.young_size)?;

        debug!(
            "gc: young={} B  old_threshold={} B  tenuring_age={}  pretenure={}",
            config.young_size,
            config.old_threshold,
            config.tenuring_age,
            config.pretenure_policy.as_str()
        );

        Ok(Gc {
            config,
            young,
            old: OldGen::new(),
            counters: Counters::default(),
            forwarding: Vec::new(),
        })
    }

    /// Creates a collector configured from `HL_GC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(GcConfig::from_env())
    }

    #[must_use]
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    fn object_size(size: usize) -> Result<u32> {
        let rounded = round_size(size.max(1))
            .filter(|&s| s <= MAX_OBJECT_SIZE)
            .ok_or_else(|| {
                warn!("gc: rejecting allocation of {} bytes", size);
                Error::AllocationTooLarge {
                    requested: size,
                    limit: MAX_OBJECT_SIZE,
                }
            })?;
        Ok(rounded as u32)
    }

    /// Allocates `size` bytes of uninitialized payload.
    ///
    /// Tries the young buffer, then runs one minor collection and tries
    /// again, then falls back to the old generation. A zero-byte request is
    /// treated as one byte.
    ///
    /// A minor collection may move previously returned young objects; see
    /// [`Gc::forward`].
    pub fn alloc(&mut self, size: usize) -> Result<GcPtr> {
        let size = Self::object_size(size)?;

        if let Some(payload) = self.young.try_alloc(size) {
            self.counters.total_allocs += 1;
            return Ok(GcPtr::new(payload));
        }

        self.collect_minor();

        if let Some(payload) = self.young.try_alloc(size) {
            self.counters.total_allocs += 1;
            return Ok(GcPtr::new(payload));
        }

        let ptr = self.alloc_old_sized(size)?;
        if self.config.pretenure_policy == PretenurePolicy::RespectThreshold
            && self.old.used_bytes() > self.config.old_threshold
        {
            // The new object is not reachable from any mark yet; pin it for
            // this collection only. Sweep clears the mark again.
            // SAFETY: `ptr` was just pushed on the old list.
            unsafe { (*GcHeader::from_payload(ptr.as_non_null()).as_ptr()).marked = true };
            self.collect_major();
        }
        Ok(ptr)
    }

    /// Allocates `size` bytes directly in the old generation.
    ///
    /// The object starts at `tenuring_age` and never moves.
    pub fn alloc_old(&mut self, size: usize) -> Result<GcPtr> {
        let size = Self::object_size(size)?;
        self.alloc_old_sized(size)
    }

    fn alloc_old_sized(&mut self, size: u32) -> Result<GcPtr> {
        let block = OldBlock::new(size, self.config.tenuring_age)?;
        let payload = self.old.push(block);
        self.counters.total_allocs += 1;
        Ok(GcPtr::new(payload))
    }

    /// Allocates a NUL-terminated copy of `s`.
    pub fn alloc_cstr(&mut self, s: &str) -> Result<GcPtr> {
        let len = s.len();
        let ptr = self.alloc(len + 1)?;
        // SAFETY: the payload holds at least `len + 1` bytes.
        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr(), ptr.as_ptr(), len);
            ptr.as_ptr().add(len).write(0);
        }
        Ok(ptr)
    }

    /// Sets the mark bit of a live object. Idempotent.
    ///
    /// # Safety
    ///
    /// `ptr` must be the current address of an object allocated by this
    /// collector and not yet reclaimed. After a minor collection, young
    /// handles must first be updated with [`Gc::forward`].
    #[inline(always)]
    pub unsafe fn mark(&mut self, ptr: GcPtr) {
        unsafe {
            (*GcHeader::from_payload(ptr.as_non_null()).as_ptr()).marked = true;
        }
    }

    /// Raw-pointer form of [`Gc::mark`]; null is ignored.
    ///
    /// # Safety
    ///
    /// Same as [`Gc::mark`] for non-null pointers.
    #[inline(always)]
    pub unsafe fn mark_raw(&mut self, ptr: *mut u8) {
        if let Some(ptr) = GcPtr::from_raw(ptr) {
            unsafe { self.mark(ptr) }
        }
    }

    /// Marks `ptr` only after checking that it is a live object of this
    /// collector. Returns whether it was found.
    ///
    /// This walks the heap and is meant for debugging and tests.
    pub fn try_mark(&mut self, ptr: GcPtr) -> bool {
        match self.find_header(ptr) {
            Some(header) => {
                // SAFETY: `find_header` only returns live headers.
                unsafe { (*header.as_ptr()).marked = true };
                true
            }
            None => false,
        }
    }

    /// Clears every mark in both generations.
    pub fn unmark_all(&mut self) {
        self.young.unmark_all();
        self.old.unmark_all();
    }

    /// Runs a minor collection, then a major collection if old usage is
    /// above the threshold.
    pub fn sweep(&mut self) {
        self.collect_minor();
        if self.old.used_bytes() > self.config.old_threshold {
            self.collect_major();
        }
    }

    /// Runs a minor and a major collection, then empties the young buffer.
    ///
    /// Young objects that were not promoted are discarded, marked or not.
    pub fn collect_full(&mut self) {
        self.collect_minor();
        self.collect_major();
        self.young.reset();
    }

    fn collect_minor(&mut self) {
        self.counters.minor_collections += 1;
        let before = self.young.used();

        let outcome = self.young.collect(
            &mut self.old,
            self.config.tenuring_age,
            &mut self.forwarding,
        );

        self.counters.collected_young += outcome.collected;
        self.counters.promoted += outcome.promoted;

        debug!(
            "minor gc #{}: {} -> {} B, survived={} promoted={} collected={}",
            self.counters.minor_collections,
            before,
            self.young.used(),
            outcome.survived,
            outcome.promoted,
            outcome.collected
        );
        if outcome.promotion_failures > 0 {
            warn!(
                "minor gc #{}: {} objects could not be promoted",
                self.counters.minor_collections,
                outcome.promotion_failures
            );
        }
    }

    fn collect_major(&mut self) {
        self.counters.major_collections += 1;
        let outcome = self.old.sweep();
        self.counters.collected_old += outcome.freed_objects;

        debug!(
            "major gc #{}: freed {} objects ({} B), {} B live",
            self.counters.major_collections,
            outcome.freed_objects,
            outcome.freed_bytes,
            self.old.used_bytes()
        );
    }

    /// Returns where an object that survived the last minor collection now
    /// lives, given its address before that collection.
    ///
    /// Returns `None` for objects that were collected, for objects that did
    /// not exist before the last minor collection and once another minor
    /// collection has run.
    #[must_use]
    pub fn forward(&self, ptr: GcPtr) -> Option<GcPtr> {
        let addr = ptr.addr();
        self.forwarding
            .binary_search_by_key(&addr, |&(from, _)| from)
            .ok()
            .map(|i| self.forwarding[i].1)
    }

    fn find_header(&self, ptr: GcPtr) -> Option<NonNull<GcHeader>> {
        let addr = ptr.addr();
        self.young.find(addr).or_else(|| {
            self.old
                .iter()
                .find(|h| GcHeader::payload(*h).as_ptr().addr() == addr)
        })
    }

    /// Looks `ptr` up by address in both generations.
    ///
    /// Returns `None` if it is not the payload address of a live object.
    #[must_use]
    pub fn generation_of(&self, ptr: GcPtr) -> Option<Generation> {
        let addr = ptr.addr();
        if self.young.find(addr).is_some() {
            Some(Generation::Young)
        } else if self.old.contains_payload(addr) {
            Some(Generation::Old)
        } else {
            None
        }
    }

    /// Returns a copy of the header of a live object.
    #[must_use]
    pub fn object_info(&self, ptr: GcPtr) -> Option<ObjectInfo> {
        self.find_header(ptr)
            // SAFETY: `find_header` only returns live headers.
            .map(|h| ObjectInfo::from_header(unsafe { h.as_ref() }))
    }

    /// Returns the mark bit of a live object, or `false` if `ptr` is not one.
    #[must_use]
    pub fn is_marked(&self, ptr: GcPtr) -> bool {
        self.object_info(ptr).is_some_and(|info| info.marked)
    }

    #[must_use]
    pub fn stats(&self) -> GcStats {
        GcStats {
            total_allocs: self.counters.total_allocs,
            minor_collections: self.counters.minor_collections,
            major_collections: self.counters.major_collections,
            promoted: self.counters.promoted,
            collected_young: self.counters.collected_young,
            collected_old: self.counters.collected_old,
            old_bytes: self.old.used_bytes(),
            old_objects: self.old.len(),
            young_bytes: self.young.used(),
            young_capacity: self.young.capacity(),
        }
    }

    /// Writes the statistics report at info level, which is off until the
    /// logger is raised (`HL_LOG=info` with [`hl_log::init_from_env`]).
    /// Use the [`GcStats`] `Display` impl to print it unconditionally.
    pub fn log_stats(&self) {
        info!("{}", self.stats());
    }
}
