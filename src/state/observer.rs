use std::{fmt, sync::Arc};

use crate::state::matches::Match;

/// Callback invoked after every successful lifecycle transition of a match.
pub trait MatchObserver: Send + Sync {
    /// React to the match having entered a new phase.
    fn on_match_changed(&self, fixture: &Match);
}

/// Subscriber list owned by a [`Match`]; called in insertion order.
#[derive(Clone, Default)]
pub struct Observers {
    entries: Vec<Arc<dyn MatchObserver>>,
}

impl Observers {
    /// Register an observer. Attaching the same handle twice registers it twice.
    pub fn attach(&mut self, observer: Arc<dyn MatchObserver>) {
        self.entries.push(observer);
    }

    /// Remove exactly the given handle. Returns whether it was registered.
    pub fn detach(&mut self, observer: &Arc<dyn MatchObserver>) -> bool {
        match self
            .entries
            .iter()
            .position(|entry| Arc::ptr_eq(entry, observer))
        {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn notify(&self, fixture: &Match) {
        for observer in &self.entries {
            observer.on_match_changed(fixture);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}
