//! Collector statistics.

use std::fmt;

/// Snapshot of collector counters and live sizes.
///
/// The first six fields only ever increase over the life of a [`Gc`].
/// The remaining fields describe the heap at the time of the snapshot.
///
/// [`Gc`]: crate::gc::Gc
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Successful allocations, young and old.
    pub total_allocs: u64,
    /// Minor collections run.
    pub minor_collections: u64,
    /// Major collections run.
    pub major_collections: u64,
    /// Objects moved from the young to the old generation.
    pub promoted: u64,
    /// Young objects dropped by minor collections.
    pub collected_young: u64,
    /// Old objects released by major collections.
    pub collected_old: u64,
    /// Old-generation bytes in use, headers included.
    pub old_bytes: usize,
    /// Objects on the old list.
    pub old_objects: usize,
    /// Young-buffer bytes in use.
    pub young_bytes: usize,
    /// Young-buffer capacity.
    pub young_capacity: usize,
}

impl fmt::Display for GcStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[GC] allocs={}  minor={}  major={}",
            self.total_allocs, self.minor_collections, self.major_collections
        )?;
        writeln!(
            f,
            "     promoted={}  collected(y={} o={})",
            self.promoted, self.collected_young, self.collected_old
        )?;
        write!(
            f,
            "     old_live={} KB  young={}/{} KB",
            self.old_bytes / 1024,
            self.young_bytes / 1024,
            self.young_capacity / 1024
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_report() {
        let stats = GcStats {
            total_allocs: 10,
            minor_collections: 2,
            major_collections: 1,
            promoted: 3,
            collected_young: 4,
            collected_old: 1,
            old_bytes: 4096,
            old_objects: 3,
            young_bytes: 2048,
            young_capacity: 65536,
        };
        assert_eq!(
            stats.to_string(),
            "[GC] allocs=10  minor=2  major=1\n     \
             promoted=3  collected(y=4 o=1)\n     \
             old_live=4 KB  young=2/64 KB"
        );
    }
}
