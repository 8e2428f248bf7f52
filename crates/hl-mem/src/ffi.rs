//! `extern "C"` entry points for compiled hacker-lang programs.
//!
//! Each thread lazily builds its own [`Gc`] from the `HL_GC_*` environment
//! variables on first use. The first collector in the process also applies
//! `HL_LOG` and `NO_COLOR` to the logger. Allocation failures return null;
//! every other call is a no-op if the collector could not be created.

use std::cell::RefCell;
use std::ffi::c_void;
use std::io::{self, Write};
use std::ptr;
use std::sync::Once;

use hl_log::error;

use crate::gc::{Gc, GcPtr};

thread_local! {
    static GC: RefCell<Option<Gc>> = const { RefCell::new(None) };
}

static LOG_INIT: Once = Once::new();

fn with_gc<R>(f: impl FnOnce(&mut Gc) -> R) -> Option<R> {
    GC.with(|cell| {
        let mut slot = cell.try_borrow_mut().ok()?;
        if slot.is_none() {
            LOG_INIT.call_once(hl_log::init_from_env);
            match Gc::from_env() {
                Ok(gc) => *slot = Some(gc),
                Err(e) => {
                    error!("gc: cannot create thread collector: {}", e);
                    return None;
                }
            }
        }
        slot.as_mut().map(f)
    })
}

fn into_raw(ptr: Option<GcPtr>) -> *mut c_void {
    ptr.map_or(ptr::null_mut(), |p| p.as_ptr().cast())
}

/// Allocates `size` bytes, trying the young generation first.
#[unsafe(no_mangle)]
pub extern "C" fn gc_malloc(size: usize) -> *mut c_void {
    into_raw(with_gc(|gc| gc.alloc(size).ok()).flatten())
}

/// Allocates `size` bytes directly in the old generation.
#[unsafe(no_mangle)]
pub extern "C" fn gc_alloc_old(size: usize) -> *mut c_void {
    into_raw(with_gc(|gc| gc.alloc_old(size).ok()).flatten())
}

/// Marks a live object. Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or the current address of an object returned by
/// `gc_malloc` or `gc_alloc_old` on this thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gc_mark(ptr: *mut c_void) {
    with_gc(|gc| unsafe { gc.mark_raw(ptr.cast()) });
}

#[unsafe(no_mangle)]
pub extern "C" fn gc_unmark_all() {
    with_gc(Gc::unmark_all);
}

#[unsafe(no_mangle)]
pub extern "C" fn gc_sweep() {
    with_gc(Gc::sweep);
}

#[unsafe(no_mangle)]
pub extern "C" fn gc_collect_full() {
    with_gc(Gc::collect_full);
}

/// Writes the statistics report to stderr, whatever the log level.
#[unsafe(no_mangle)]
pub extern "C" fn gc_stats_print() {
    // Nowhere left to report a failed stderr write.
    let _ = write_stats(&mut io::stderr().lock());
}

fn write_stats(out: &mut impl Write) -> io::Result<()> {
    match with_gc(|gc| gc.stats()) {
        Some(stats) => writeln!(out, "{stats}"),
        None => Ok(()),
    }
}

/// Copies four counters out. Null outputs are skipped.
///
/// # Safety
///
/// Each non-null pointer must be valid for a `u64` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gc_stats_get(
    minor_out: *mut u64,
    major_out: *mut u64,
    promoted_out: *mut u64,
    total_out: *mut u64,
) {
    let Some(stats) = with_gc(|gc| gc.stats()) else {
        return;
    };
    let outputs = [
        (minor_out, stats.minor_collections),
        (major_out, stats.major_collections),
        (promoted_out, stats.promoted),
        (total_out, stats.total_allocs),
    ];
    for (out, value) in outputs {
        if !out.is_null() {
            // SAFETY: the caller guarantees non-null outputs are writable.
            unsafe { out.write(value) };
        }
    }
}
