//! Cooperative stop primitives for running actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative stop token shared between an action handle and the
/// running action body.
///
/// Stop delivery is cooperative: the engine sets the flag and the action
/// polls [`StopToken::action_ok`] in its loops. Well-behaved actions exit
/// within the stop timeout.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    stop_requested: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self, reason: impl Into<String>) {
        self.stop_requested.store(true, Ordering::SeqCst);
        let mut guard = self.reason.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(reason.into());
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// The predicate action bodies poll: negation of the stop flag.
    pub fn action_ok(&self) -> bool {
        !self.stop_requested()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::StopToken;

    #[test]
    fn token_starts_ok_and_flips_on_request() {
        let token = StopToken::new();
        assert!(token.action_ok());
        assert!(!token.stop_requested());
        assert_eq!(token.reason(), None);

        token.request_stop("graph stopped");
        assert!(!token.action_ok());
        assert!(token.stop_requested());
        assert_eq!(token.reason(), Some("graph stopped".to_string()));
    }

    #[test]
    fn clones_share_the_flag() {
        let token = StopToken::new();
        let seen_by_action = token.clone();
        token.request_stop("stop");
        assert!(!seen_by_action.action_ok());
    }
}
