//! Hook into whoever owns the backend process.
//!
//! The session never spawns or restarts the backend. On a restart command
//! it calls [`ProcessControl::kill`] once; the owner decides whether to
//! start a new backend and connect a new session.

/// Process-lifecycle collaborator.
pub trait ProcessControl: Send + 'static {
    /// Hard-kill the backend process.
    fn kill(&self);
}

impl<F> ProcessControl for F
where
    F: Fn() + Send + 'static,
{
    fn kill(&self) {
        self()
    }
}

/// For backends whose lifecycle is managed elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unmanaged;

impl ProcessControl for Unmanaged {
    fn kill(&self) {
        tracing::debug!("Backend is unmanaged, ignoring kill request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_is_process_control() {
        let kills = Arc::new(AtomicUsize::new(0));
        let counter = kills.clone();
        let control = move || {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        control.kill();
        control.kill();

        assert_eq!(kills.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unmanaged_kill_is_noop() {
        Unmanaged.kill();
    }
}
