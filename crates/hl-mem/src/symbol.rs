//! Handles for interned strings.

use std::fmt;

/// A 32-bit handle to a string in a [`StringInterner`].
///
/// Symbols from the same interner compare equal exactly when their strings
/// do. IDs are dense and assigned in interning order.
///
/// ```
/// use hl_mem::Symbol;
///
/// let sym = Symbol::new(7);
/// assert_eq!(sym.as_u32(), 7);
/// assert!(Symbol::INVALID.is_invalid());
/// ```
///
/// [`StringInterner`]: crate::interner::StringInterner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Placeholder that no interner ever returns.
    pub const INVALID: Symbol = Symbol(u32::MAX);

    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The ID as an index into the interner's table.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("#invalid")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

impl From<u32> for Symbol {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_ids() {
        let sym = Symbol::new(42);
        assert_eq!(sym.as_u32(), 42);
        assert_eq!(sym.as_usize(), 42);
        assert_eq!(Symbol::from(42), sym);
    }

    #[test]
    fn test_symbol_ordering() {
        assert!(Symbol::new(1) < Symbol::new(2));
        assert_ne!(Symbol::new(1), Symbol::new(2));
    }

    #[test]
    fn test_invalid_symbol() {
        assert!(Symbol::INVALID.is_invalid());
        assert!(Symbol::default().is_invalid());
        assert!(!Symbol::new(0).is_invalid());
    }

    #[test]
    fn test_symbol_display() {
        assert_eq!(Symbol::new(3).to_string(), "#3");
        assert_eq!(Symbol::INVALID.to_string(), "#invalid");
    }
}
