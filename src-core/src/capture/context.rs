//! Capture context ownership and cross-thread handoff.
//!
//! The capture context is the exclusive capability required to issue
//! session-mutating or grab operations. It is owned by at most one thread at
//! a time, but ownership outlives any single call stack: the owning thread
//! releases the context, another thread binds it later. That rules out a
//! mutex (unlocking from a different thread is undefined), so the owner is
//! tracked as a single atomic word mutated only by compare-and-swap.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::capture::error::CaptureError;

/// Sentinel owner value meaning "no thread holds the context".
const UNBOUND: u64 = 0;

/// Global counter handing out nonzero owner ids, one per thread.
static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static OWNER_ID: u64 = NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed);
}

/// Returns the calling thread's owner id.
pub(crate) fn current_owner() -> u64 {
    OWNER_ID.with(|id| *id)
}

/// The bind/release capability guarding a capture session.
///
/// State is `Unbound` or bound to exactly one owner id. Both transitions are
/// compare-and-swap with acquire-release ordering, so everything written
/// while bound is visible to whichever thread binds next.
pub struct CaptureContext {
    owner: AtomicU64,
}

impl CaptureContext {
    /// Creates a context with no owner.
    pub(crate) fn unbound() -> Self {
        Self {
            owner: AtomicU64::new(UNBOUND),
        }
    }

    /// Binds the context to the calling thread.
    ///
    /// Fails with `ContextBusy` unless the context is currently unbound,
    /// including when the caller itself already holds it.
    pub fn bind(&self) -> Result<(), CaptureError> {
        let me = current_owner();
        match self
            .owner
            .compare_exchange(UNBOUND, me, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => Err(CaptureError::ContextBusy),
        }
    }

    /// Releases the context held by the calling thread.
    ///
    /// Fails with `NotBound` if the context is unbound, and with
    /// `ContextNotOwned` if another thread holds it; in both cases the owner
    /// is left unchanged. Ownership is never transferred silently.
    pub fn release(&self) -> Result<(), CaptureError> {
        let me = current_owner();
        match self
            .owner
            .compare_exchange(me, UNBOUND, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(UNBOUND) => Err(CaptureError::NotBound),
            Err(_) => Err(CaptureError::ContextNotOwned),
        }
    }

    /// Verifies the calling thread holds the context.
    pub fn ensure_owned(&self) -> Result<(), CaptureError> {
        match self.owner.load(Ordering::Acquire) {
            UNBOUND => Err(CaptureError::NotBound),
            id if id == current_owner() => Ok(()),
            _ => Err(CaptureError::ContextNotOwned),
        }
    }

    /// Whether any thread currently holds the context.
    pub fn is_bound(&self) -> bool {
        self.owner.load(Ordering::Acquire) != UNBOUND
    }

    /// Binds the context to the calling thread at session-open time.
    ///
    /// Opening a session implies a bound context (provider handle creation
    /// binds the creator), so this tolerates the caller already holding it.
    pub(crate) fn claim(&self) -> Result<(), CaptureError> {
        match self.ensure_owned() {
            Ok(()) => Ok(()),
            Err(CaptureError::NotBound) => self.bind(),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn bind_then_bind_fails_busy() {
        let ctx = Arc::new(CaptureContext::unbound());
        ctx.bind().unwrap();

        // A second bind from another thread must observe ContextBusy.
        let ctx2 = ctx.clone();
        let err = thread::spawn(move || ctx2.bind().unwrap_err())
            .join()
            .unwrap();
        assert_eq!(err, CaptureError::ContextBusy);

        // Rebinding from the owning thread is also a contract violation.
        assert_eq!(ctx.bind().unwrap_err(), CaptureError::ContextBusy);
    }

    #[test]
    fn release_by_non_owner_fails_and_owner_unchanged() {
        let ctx = Arc::new(CaptureContext::unbound());
        ctx.bind().unwrap();

        let ctx2 = ctx.clone();
        let err = thread::spawn(move || ctx2.release().unwrap_err())
            .join()
            .unwrap();
        assert_eq!(err, CaptureError::ContextNotOwned);

        // The original owner still holds the context and can release it.
        assert!(ctx.is_bound());
        ctx.release().unwrap();
        assert!(!ctx.is_bound());
    }

    #[test]
    fn release_while_unbound_fails_not_bound() {
        let ctx = CaptureContext::unbound();
        assert_eq!(ctx.release().unwrap_err(), CaptureError::NotBound);
    }

    #[test]
    fn handoff_between_threads() {
        let ctx = Arc::new(CaptureContext::unbound());
        ctx.bind().unwrap();
        ctx.release().unwrap();

        let ctx2 = ctx.clone();
        thread::spawn(move || {
            ctx2.bind().unwrap();
            ctx2.ensure_owned().unwrap();
            ctx2.release().unwrap();
        })
        .join()
        .unwrap();

        // Ownership came back to unbound; this thread can reclaim it.
        ctx.bind().unwrap();
        ctx.release().unwrap();
    }

    #[test]
    fn mutual_exclusion_under_stress() {
        let ctx = Arc::new(CaptureContext::unbound());
        let inside = Arc::new(AtomicU32::new(0));
        let acquired = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for t in 0..8 {
            let ctx = ctx.clone();
            let inside = inside.clone();
            let acquired = acquired.clone();
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    if ctx.bind().is_ok() {
                        let n = inside.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(n, 0, "two threads observed the context as bound");
                        // Interleave with varied delays to shake out races.
                        if (t + i) % 3 == 0 {
                            thread::sleep(Duration::from_micros(((t * 7 + i) % 50) as u64));
                        }
                        inside.fetch_sub(1, Ordering::SeqCst);
                        acquired.fetch_add(1, Ordering::SeqCst);
                        ctx.release().unwrap();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert!(!ctx.is_bound());
        assert!(acquired.load(Ordering::SeqCst) > 0);
    }
}
