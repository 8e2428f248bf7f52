//! Arena construction for compiler phases.
//!
//! The compiler runs in strictly ordered phases (tokens, then AST, then IR)
//! and gives each its own [`Arena`]. [`ArenaFactory`] builds arenas of one
//! configured size; [`PhaseArenas`] owns one arena per [`Phase`] so a phase
//! can be reset without touching the others.
//!
//! # Examples
//!
//! ```
//! use hl_mem::factory::{Phase, PhaseArenas};
//!
//! let mut arenas = PhaseArenas::new().unwrap();
//!
//! let tok = arenas.arena(Phase::Tokens).alloc(1u32).unwrap();
//! unsafe { assert_eq!(*tok.as_ptr(), 1) };
//!
//! arenas.reset(Phase::Tokens);
//! assert_eq!(arenas.arena(Phase::Tokens).stats().allocations, 0);
//! ```

use std::fmt;

use hl_log::debug;

use crate::arena::Arena;
use crate::error::Result;

/// Creates arenas with a fixed initial size.
///
/// There is no pooling: every call returns a fresh arena that releases its
/// memory when dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFactory {
    initial_size: usize,
}

impl ArenaFactory {
    #[must_use]
    pub const fn new(initial_size: usize) -> Self {
        Self { initial_size }
    }

    /// Factory sized for `phase`.
    #[must_use]
    pub const fn for_phase(phase: Phase) -> Self {
        Self::new(phase.initial_size())
    }

    #[must_use]
    pub const fn initial_size(&self) -> usize {
        self.initial_size
    }

    pub fn create_arena(&self) -> Result<Arena> {
        Arena::new(self.initial_size)
    }
}

/// Compiler phase with its own arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Lexer output.
    Tokens,
    /// Syntax tree.
    Ast,
    /// Intermediate representation.
    Ir,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Tokens, Phase::Ast, Phase::Ir];

    /// Initial arena size for the phase's expected working set.
    #[must_use]
    pub const fn initial_size(self) -> usize {
        match self {
            Phase::Tokens => 512 * 1024,
            Phase::Ast => 4 * 1024 * 1024,
            Phase::Ir => 8 * 1024 * 1024,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Tokens => "tokens",
            Phase::Ast => "ast",
            Phase::Ir => "ir",
        }
    }

    const fn index(self) -> usize {
        match self {
            Phase::Tokens => 0,
            Phase::Ast => 1,
            Phase::Ir => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One arena per compiler phase.
#[derive(Debug)]
pub struct PhaseArenas {
    arenas: [Arena; 3],
}

impl PhaseArenas {
    /// Creates the three phase arenas at their default sizes.
    pub fn new() -> Result<Self> {
        Self::with_factories(Phase::ALL.map(ArenaFactory::for_phase))
    }

    /// Creates the phase arenas from one factory per phase, in
    /// [`Phase::ALL`] order.
    pub fn with_factories(factories: [ArenaFactory; 3]) -> Result<Self> {
        let [tokens, ast, ir] = factories;
        Ok(Self {
            arenas: [
                tokens.create_arena()?,
                ast.create_arena()?,
                ir.create_arena()?,
            ],
        })
    }

    #[must_use]
    pub fn arena(&self, phase: Phase) -> &Arena {
        &self.arenas[phase.index()]
    }

    /// Resets one phase's arena, leaving the others alone.
    pub fn reset(&mut self, phase: Phase) {
        debug!("resetting {} arena", phase);
        self.arenas[phase.index()].reset();
    }

    /// Logs every phase arena's statistics at info level. See
    /// [`Arena::log_stats`] for enabling it.
    pub fn log_stats(&self) {
        for phase in Phase::ALL {
            self.arena(phase).log_stats(phase.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_independent_arenas() {
        let factory = ArenaFactory::new(4096);
        let a = factory.create_arena().unwrap();
        let b = factory.create_arena().unwrap();

        let x = a.alloc(1u32).unwrap();
        let y = b.alloc(2u32).unwrap();
        unsafe {
            assert_eq!(*x.as_ptr(), 1);
            assert_eq!(*y.as_ptr(), 2);
        }
        assert_ne!(x, y);
        assert_eq!(b.stats().allocations, 1);
    }

    #[test]
    fn test_phase_sizes() {
        assert_eq!(Phase::Tokens.initial_size(), 512 * 1024);
        assert_eq!(Phase::Ast.initial_size(), 4 * 1024 * 1024);
        assert_eq!(Phase::Ir.initial_size(), 8 * 1024 * 1024);
        assert_eq!(ArenaFactory::for_phase(Phase::Ast).initial_size(), 4 * 1024 * 1024);
    }

    #[test]
    fn test_phase_arenas_capacity() {
        let arenas = PhaseArenas::new().unwrap();
        for phase in Phase::ALL {
            assert_eq!(arenas.arena(phase).stats().total_capacity, phase.initial_size());
        }
    }

    #[test]
    fn test_reset_is_per_phase() {
        let factories = [ArenaFactory::new(4096); 3];
        let mut arenas = PhaseArenas::with_factories(factories).unwrap();

        arenas.arena(Phase::Tokens).alloc_bytes(64).unwrap();
        arenas.arena(Phase::Ast).alloc_bytes(64).unwrap();
        arenas.reset(Phase::Tokens);

        assert_eq!(arenas.arena(Phase::Tokens).stats().used_bytes, 0);
        assert_eq!(arenas.arena(Phase::Ast).stats().used_bytes, 64);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Ir.to_string(), "ir");
    }
}
