//! Generation fencing for stale async results.
//!
//! Every action that starts cascading work bumps the generation of its
//! scope and captures the returned [`Generation`]. Before a result is
//! applied the capture is checked with [`Fence::is_current`]; a stale result
//! is dropped without side effects.
//!
//! ```text
//! selectRoute(A) ──bump──► route#1 ──fetch A────────────────► apply? #1 != #2 → drop
//! selectRoute(B) ──bump──► route#2 ──fetch B──► apply? #2 == #2 → apply
//! ```
//!
//! Counters only ever increase. Checks that must be atomic with respect to
//! bumps run inside the [`crate::state::StateStore`] critical section.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A cancellable selection scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Stops-in-view queries.
    Viewport,
    /// Route geometry, trips and vehicles.
    Route,
    /// Trip shape and stops.
    Trip,
    /// The stop panel (routes through a stop, active-route probe).
    Stop,
}

impl Scope {
    /// All scopes.
    pub const ALL: [Scope; 4] = [Scope::Viewport, Scope::Route, Scope::Trip, Scope::Stop];

    fn index(self) -> usize {
        match self {
            Scope::Viewport => 0,
            Scope::Route => 1,
            Scope::Trip => 2,
            Scope::Stop => 3,
        }
    }

    /// Lower-case name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Scope::Viewport => "viewport",
            Scope::Route => "route",
            Scope::Trip => "trip",
            Scope::Stop => "stop",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A generation token captured when work for a scope was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation {
    scope: Scope,
    value: u64,
}

impl Generation {
    /// The scope this token belongs to.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The counter value at capture time.
    pub fn value(&self) -> u64 {
        self.value
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.scope, self.value)
    }
}

/// One monotonic counter per [`Scope`].
#[derive(Debug, Default)]
pub struct Fence {
    counters: [AtomicU64; 4],
}

impl Fence {
    /// Create a fence with every scope at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all outstanding tokens of `scope` and return the new one.
    pub fn bump(&self, scope: Scope) -> Generation {
        let value = self.counters[scope.index()].fetch_add(1, Ordering::SeqCst) + 1;
        Generation { scope, value }
    }

    /// The current token of `scope`, without bumping.
    pub fn current(&self, scope: Scope) -> Generation {
        Generation {
            scope,
            value: self.counters[scope.index()].load(Ordering::SeqCst),
        }
    }

    /// Whether `token` is still the latest generation of its scope.
    pub fn is_current(&self, token: Generation) -> bool {
        self.current(token.scope).value == token.value
    }

    /// Whether every token in `tokens` is current.
    pub fn all_current(&self, tokens: &[Generation]) -> bool {
        tokens.iter().all(|t| self.is_current(*t))
    }
}
