//! Edge-triggered change detection
//!
//! Callers poll on a fixed cadence; a notification should fire once per
//! change of state, never on every observation.

use serde::{Deserialize, Serialize};

/// A change from one observed value to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition<T> {
    pub from: T,
    pub to: T,
}

/// Remembers the last observed value and reports only changes
#[derive(Debug, Clone)]
pub struct TransitionDetector<T> {
    current: T,
}

impl<T: PartialEq + Clone> TransitionDetector<T> {
    /// Start from a baseline; observing the baseline again is not a change
    pub fn new(baseline: T) -> Self {
        Self { current: baseline }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn observe(&mut self, next: T) -> Option<Transition<T>> {
        if next == self.current {
            return None;
        }
        let from = std::mem::replace(&mut self.current, next.clone());
        Some(Transition { from, to: next })
    }
}

impl<T: PartialEq + Clone + Default> Default for TransitionDetector<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
