//! Background job execution
//!
//! The ingestion trigger returns as soon as work is scheduled, so the actual
//! execution strategy is pluggable. Servers hand closures to their runtime,
//! CLI commands and tests run them on a plain thread or inline.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle returned when work is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: u64,
}

impl JobHandle {
    /// Allocate the next process-unique handle
    pub fn next() -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Where background work gets executed
///
/// Implementations run each submitted closure at least once and must not
/// block submission on the work itself (except [`InlineRunner`], which is
/// deliberately synchronous).
pub trait JobRunner: Send + Sync {
    fn submit(&self, work: Box<dyn FnOnce() + Send + 'static>) -> JobHandle;
}

/// Runs each job on a freshly spawned detached thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRunner;

impl JobRunner for ThreadRunner {
    fn submit(&self, work: Box<dyn FnOnce() + Send + 'static>) -> JobHandle {
        let handle = JobHandle::next();
        std::thread::spawn(work);
        handle
    }
}

/// Runs each job on the calling thread before returning
///
/// For tests, where deterministic completion matters more than latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineRunner;

impl JobRunner for InlineRunner {
    fn submit(&self, work: Box<dyn FnOnce() + Send + 'static>) -> JobHandle {
        let handle = JobHandle::next();
        work();
        handle
    }
}
