//! Per-run failure tracking and circuit breaking.
//!
//! [`RunState`] is the single piece of mutable state shared across one
//! import run. Every task completion reports into it; the orchestrator and
//! the staging writer read it to decide whether to keep going. A fresh
//! value is created per invocation and passed by `Arc` into every
//! component, so concurrent invocations never share a breaker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Consecutive-failure counter with a one-way continuation flag.
///
/// Task completions can arrive concurrently from the upload workers, so
/// both fields are atomics.
#[derive(Debug)]
pub struct RunState {
    max_failures: u32,
    failure_count: AtomicU32,
    should_continue: AtomicBool,
}

impl RunState {
    /// Fresh state for one invocation: zero failures, continuation allowed.
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            failure_count: AtomicU32::new(0),
            should_continue: AtomicBool::new(true),
        }
    }

    /// Record one failed task. Trips the breaker when the consecutive
    /// count reaches the configured maximum.
    pub fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.max_failures {
            self.should_continue.store(false, Ordering::SeqCst);
        }
    }

    /// Record one successful task. Resets the consecutive counter but
    /// never un-trips the breaker: once tripped, the run cannot
    /// self-resume.
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
    }

    /// Whether new work may still be created or enqueued.
    pub fn should_continue(&self) -> bool {
        self.should_continue.load(Ordering::SeqCst)
    }

    /// Current consecutive-failure count.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }
}
