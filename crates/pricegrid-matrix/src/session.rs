//! Fetch sessions and their cancellation scopes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Which pathway a session serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// The window currently on display; drives the pending set and errors.
    Primary,
    /// A silent background load of a neighboring window.
    Prefetch,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Primary => f.write_str("primary"),
            SessionKind::Prefetch => f.write_str("prefetch"),
        }
    }
}

/// One logical fetch operation.
#[derive(Debug, Clone)]
pub struct Session {
    generation: u64,
    kind: SessionKind,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session with its own cancellation scope.
    pub fn new(generation: u64, kind: SessionKind, cancel: CancellationToken) -> Self {
        Self {
            generation,
            kind,
            cancel,
        }
    }

    /// Create a primary session.
    pub fn primary(generation: u64) -> Self {
        Self::new(generation, SessionKind::Primary, CancellationToken::new())
    }

    /// Create a prefetch session.
    pub fn prefetch(generation: u64, cancel: CancellationToken) -> Self {
        Self::new(generation, SessionKind::Prefetch, cancel)
    }

    /// Monotonic identifier.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Session kind.
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Whether this is a prefetch session.
    pub fn is_prefetch(&self) -> bool {
        self.kind == SessionKind::Prefetch
    }

    /// False once cancelled. Checked before every side effect.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel the session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The session's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Source of session generations.
#[derive(Debug, Default)]
pub struct Generations {
    next: AtomicU64,
}

impl Generations {
    /// Create a counter starting at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next generation.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_deactivates() {
        let session = Session::primary(1);
        assert!(session.is_active());
        assert!(!session.is_prefetch());

        let clone = session.clone();
        clone.cancel();
        assert!(!session.is_active());
    }

    #[test]
    fn test_prefetch_follows_parent_token() {
        let parent = CancellationToken::new();
        let session = Session::prefetch(4, parent.child_token());
        assert!(session.is_prefetch());
        assert_eq!(session.kind().to_string(), "prefetch");

        parent.cancel();
        assert!(!session.is_active());
    }

    #[test]
    fn test_generations_increase() {
        let generations = Generations::new();
        assert_eq!(generations.next(), 1);
        assert_eq!(generations.next(), 2);
    }
}
