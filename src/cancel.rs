//! Cooperative cancellation for migration runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation signal shared between a caller and a running migration.
///
/// The engine checks the token before acquiring the migration lock and between
/// individual migration steps - never in the middle of a script, since a torn
/// mid-migration cancellation is worse than letting one started step finish.
///
/// Cloning is cheap; all clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
