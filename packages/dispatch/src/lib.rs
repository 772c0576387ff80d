#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Latest-wins gate for rapid-fire asynchronous queries.
//!
//! Interactive triggers (slider drags, pointer drags, keystrokes) can fire
//! many times per second, each wanting to issue an aggregate query whose
//! response may arrive in any order. [`Debounced`] guarantees that only the
//! most recently started run is allowed to publish its result: every run
//! captures a ticket from a generation counter, and a completion whose
//! ticket is no longer current resolves to [`Outcome::Superseded`] instead
//! of its value.
//!
//! Being superseded is a normal outcome, not a failure — callers match on
//! it and return silently. Errors produced by a superseded run are also
//! swallowed into [`Outcome::Superseded`], so a stale query can never
//! surface a user-visible error for input the user has already abandoned.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// The result of a gated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The run was still the most recent when it finished; its value holds.
    Completed(T),
    /// A newer run (or an [`invalidate`](Debounced::invalidate) call)
    /// started before this one finished. The value was discarded.
    Superseded,
}

impl<T> Outcome<T> {
    /// Returns the completed value, or `None` if the run was superseded.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Superseded => None,
        }
    }

    /// Returns `true` if the run was superseded.
    pub const fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

/// Generation-counter gate ensuring at most the latest of many concurrent
/// runs publishes its result.
///
/// One instance guards one logical output (e.g., the summary panel). All
/// triggering inputs for that output must go through the same instance;
/// otherwise the last-writer-wins guarantee does not hold across them.
#[derive(Debug, Default)]
pub struct Debounced {
    generation: AtomicU64,
}

impl Debounced {
    /// Creates a gate with no runs issued yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
        }
    }

    /// Runs `fut`, discarding its output if a newer run starts first.
    ///
    /// The ticket is captured before the future is polled, so two `run`
    /// calls racing from different tasks resolve consistently: whichever
    /// incremented the counter last is the one whose value survives.
    pub async fn run<T, Fut>(&self, fut: Fut) -> Outcome<T>
    where
        Fut: Future<Output = T>,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let value = fut.await;
        if self.generation.load(Ordering::SeqCst) == ticket {
            Outcome::Completed(value)
        } else {
            Outcome::Superseded
        }
    }

    /// Marks every in-flight run as stale without starting a new one.
    ///
    /// Used when the inputs a pending result was computed from no longer
    /// exist — e.g., the search region was cleared or interactive mode was
    /// deactivated. A stale result arriving afterwards resolves to
    /// [`Outcome::Superseded`] and never repopulates the display.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
