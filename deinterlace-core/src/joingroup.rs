//! A counter with a completion callback, invoked when it returns to zero
//! (spec §9 GLOSSARY "Join group"). Used to await N concurrently running
//! `TrackPipeline`s without the Orchestrator holding a lifetime-scoped
//! borrow over threads it starts one at a time (see SPEC_FULL.md §5).
//!
//! The counter must be incremented before a pipeline starts and decremented
//! on its exit, never the other way around, to avoid the group completing
//! spuriously while a pipeline is still being spawned (spec §5).

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct Inner {
    count: Mutex<usize>,
    zero: Condvar,
}

#[derive(Clone)]
pub struct JoinGroup {
    inner: Arc<Inner>,
}

impl JoinGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
        }
    }

    /// Increment before starting a member. Must be called on the thread
    /// that owns the group, strictly before the member's thread is spawned.
    pub fn enter(&self) {
        *self.inner.count.lock() += 1;
    }

    /// Decrement on a member's exit. Wakes `wait()` once the count returns
    /// to zero.
    pub fn leave(&self) {
        let mut count = self.inner.count.lock();
        *count -= 1;
        if *count == 0 {
            self.inner.zero.notify_all();
        }
    }

    /// Block until every member currently entered has left.
    pub fn wait(&self) {
        let mut count = self.inner.count.lock();
        while *count != 0 {
            self.inner.zero.wait(&mut count);
        }
    }
}

impl Default for JoinGroup {
    fn default() -> Self {
        Self::new()
    }
}
