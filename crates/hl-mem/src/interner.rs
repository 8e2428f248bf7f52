//! String interning for compiler identifiers.
//!
//! Interned text lives in a private [`Arena`], so a string is copied once
//! and every later lookup hands back the same [`Symbol`].
//!
//! # Examples
//!
//! ```
//! use hl_mem::StringInterner;
//!
//! let mut interner = StringInterner::with_keywords(&["fn", "let", "return"]).unwrap();
//!
//! let name = interner.intern("counter").unwrap();
//! assert_eq!(interner.intern("counter").unwrap(), name);
//! assert_eq!(interner.resolve(name), Some("counter"));
//!
//! let kw = interner.get("let").unwrap();
//! assert_eq!(kw.as_u32(), 1);
//! assert!(interner.is_keyword(kw));
//! ```

use std::slice;
use std::str;

#[cfg(feature = "symbols")]
use hashbrown::HashMap;

#[cfg(not(feature = "symbols"))]
use std::collections::HashMap;

use crate::arena::{Arena, ArenaStats};
use crate::error::{Error, Result};
use crate::symbol::Symbol;

/// Initial arena size for interned text.
const INTERNER_ARENA_SIZE: usize = 8 * 1024;

/// Bidirectional map between strings and [`Symbol`]s.
pub struct StringInterner {
    // Both tables borrow from `arena`; they are never handed out with a
    // lifetime longer than `&self`, and the arena is never reset.
    symbols: HashMap<&'static str, Symbol>,
    strings: Vec<&'static str>,
    keyword_count: u32,
    arena: Arena,
}

impl StringInterner {
    /// Creates an empty interner.
    pub fn new() -> Result<Self> {
        Ok(Self {
            symbols: HashMap::new(),
            strings: Vec::new(),
            keyword_count: 0,
            arena: Arena::new(INTERNER_ARENA_SIZE)?,
        })
    }

    /// Creates an interner with `keywords` pre-interned at IDs `0..n`.
    ///
    /// Duplicate keywords keep their first ID.
    pub fn with_keywords(keywords: &[&str]) -> Result<Self> {
        let mut interner = Self::new()?;
        for keyword in keywords {
            interner.intern(keyword)?;
        }
        interner.keyword_count = interner.strings.len() as u32;
        Ok(interner)
    }

    /// Returns the symbol for `s`, interning it on first sight.
    pub fn intern(&mut self, s: &str) -> Result<Symbol> {
        if let Some(&sym) = self.symbols.get(s) {
            return Ok(sym);
        }

        let id = u32::try_from(self.strings.len())
            .ok()
            .filter(|&id| id != u32::MAX)
            .ok_or(Error::AllocationTooLarge {
                requested: self.strings.len(),
                limit: u32::MAX as usize - 1,
            })?;

        let ptr = self.arena.alloc_str(s)?;
        // SAFETY: `alloc_str` copied `s.len()` bytes of valid UTF-8; the
        // arena outlives both tables and is never rewound.
        let stored: &'static str = unsafe {
            str::from_utf8_unchecked(slice::from_raw_parts(ptr.as_ptr(), s.len()))
        };

        let sym = Symbol::new(id);
        self.strings.push(stored);
        self.symbols.insert(stored, sym);
        Ok(sym)
    }

    /// Looks `s` up without interning it.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.symbols.get(s).copied()
    }

    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.as_usize()).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// True for symbols created by [`StringInterner::with_keywords`].
    #[must_use]
    pub const fn is_keyword(&self, sym: Symbol) -> bool {
        sym.as_u32() < self.keyword_count
    }

    /// Statistics of the arena holding the interned text.
    #[must_use]
    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYWORDS: &[&str] = &["fn", "let", "if", "else", "return", "loop"];

    #[test]
    fn test_empty_interner() {
        let interner = StringInterner::new().unwrap();
        assert!(interner.is_empty());
        assert_eq!(interner.len(), 0);
        assert_eq!(interner.get("fn"), None);
    }

    #[test]
    fn test_keyword_ids_in_order() {
        let mut interner = StringInterner::with_keywords(KEYWORDS).unwrap();
        assert_eq!(interner.len(), KEYWORDS.len());

        for (i, &keyword) in KEYWORDS.iter().enumerate() {
            let sym = interner.intern(keyword).unwrap();
            assert_eq!(sym.as_u32(), i as u32);
            assert!(interner.is_keyword(sym));
            assert_eq!(interner.resolve(sym), Some(keyword));
        }
    }

    #[test]
    fn test_duplicate_keywords() {
        let interner = StringInterner::with_keywords(&["fn", "fn", "let"]).unwrap();
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.get("let").map(Symbol::as_u32), Some(1));
    }

    #[test]
    fn test_identifiers_follow_keywords() {
        let mut interner = StringInterner::with_keywords(KEYWORDS).unwrap();
        let a = interner.intern("alpha").unwrap();
        let b = interner.intern("beta").unwrap();

        assert_eq!(a.as_usize(), KEYWORDS.len());
        assert_eq!(b.as_usize(), KEYWORDS.len() + 1);
        assert!(!interner.is_keyword(a));
        assert_eq!(interner.intern("alpha").unwrap(), a);
    }

    #[test]
    fn test_resolve_unknown() {
        let interner = StringInterner::new().unwrap();
        assert_eq!(interner.resolve(Symbol::new(9999)), None);
        assert_eq!(interner.resolve(Symbol::INVALID), None);
    }

    #[test]
    fn test_many_identifiers_grow_arena() {
        let mut interner = StringInterner::new().unwrap();
        let syms: Vec<Symbol> = (0..2000)
            .map(|i| interner.intern(&format!("identifier_{i}")).unwrap())
            .collect();

        assert_eq!(interner.len(), 2000);
        assert!(interner.arena_stats().chunk_count > 1);
        for (i, &sym) in syms.iter().enumerate() {
            let expected = format!("identifier_{i}");
            assert_eq!(interner.resolve(sym), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_empty_and_unicode_strings() {
        let mut interner = StringInterner::new().unwrap();
        let empty = interner.intern("").unwrap();
        let wide = interner.intern("zmienna_ł").unwrap();
        let cjk = interner.intern("变量").unwrap();

        assert_eq!(interner.resolve(empty), Some(""));
        assert_eq!(interner.resolve(wide), Some("zmienna_ł"));
        assert_eq!(interner.resolve(cjk), Some("变量"));
    }
}
