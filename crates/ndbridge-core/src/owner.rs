use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config;
use crate::error::LifetimeError;

// OwnerToken — exactly-once release of an exported allocation
//
// A token pairs an opaque context with a deleter and carries a reference
// count. It plays the role of a capsule object on the foreign side:
//
//   let token = OwnerToken::new(buffer, drop);   // refs = 1, held by the caller
//   let copy  = token.acquire()?;                // refs = 2
//   unsafe { copy.release() }?;                  // refs = 1 → Live(1)
//   unsafe { token.release() }?;                 // refs = 0 → deleter runs → Finalized
//   unsafe { token.release() }                   // Err(DoubleRelease)
//
// `OwnerToken` itself is NOT counted: cloning it copies the handle, like
// copying a raw object pointer. Counting happens only through
// `acquire`/`release`, which is the protocol a host runtime speaks. Any
// handle can be released, so `release` (and `adopt`, which arranges a later
// release) are `unsafe`: the caller promises it owns the reference it gives
// up. `acquire` is safe, an extra reference can only delay the deleter.
//
// Rust code holds `OwnerGuard`s instead. A guard owns exactly one reference:
// cloning acquires, dropping releases. Descriptors, views and adapter aliases
// keep the allocation alive through guards, so letting a descriptor go out
// of scope while a view is still alive is safe.
//
// The count is atomic and the deleter is moved out of its slot before it is
// called, so even with racing releases it runs at most once, on the thread
// whose decrement reached zero. A finalized token can never be revived:
// `acquire` refuses to increment a zero count.

/// Identity of an owner token, stable for its whole life. Used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        OwnerId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Deleter = Box<dyn FnOnce() + Send>;

struct OwnerCell {
    id: OwnerId,
    refs: AtomicUsize,
    deleter: Mutex<Option<Deleter>>,
}

/// Result of a successful [`OwnerToken::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other references remain; the count after the decrement.
    Live(usize),
    /// This was the last reference and the deleter has run.
    Finalized,
}

/// Reference-counted handle guaranteeing exactly-once release of an allocation.
#[derive(Clone)]
pub struct OwnerToken {
    cell: Arc<OwnerCell>,
}

struct RawContext(*mut c_void);

// SAFETY: `from_raw` requires the deleter to accept the context on any thread.
unsafe impl Send for RawContext {}

impl OwnerToken {
    /// Create a token with a count of 1, owned by the caller.
    ///
    /// `deleter` receives `context` once the count drops to zero.
    pub fn new<C, F>(context: C, deleter: F) -> Self
    where
        C: Send + 'static,
        F: FnOnce(C) + Send + 'static,
    {
        let cell = OwnerCell {
            id: OwnerId::next(),
            refs: AtomicUsize::new(1),
            deleter: Mutex::new(Some(Box::new(move || deleter(context)))),
        };
        tracing::trace!(owner = ?cell.id, "owner created");
        OwnerToken {
            cell: Arc::new(cell),
        }
    }

    /// Create a token from a C-style context pointer and deleter.
    ///
    /// # Safety
    ///
    /// `deleter(context)` must be sound to call exactly once, from any thread,
    /// at any point after this call.
    pub unsafe fn from_raw(
        context: *mut c_void,
        deleter: unsafe extern "C" fn(*mut c_void),
    ) -> Self {
        let context = RawContext(context);
        Self::new(context, move |ctx: RawContext| {
            // SAFETY: guaranteed by the caller of `from_raw`.
            unsafe { deleter(ctx.0) }
        })
    }

    pub fn id(&self) -> OwnerId {
        self.cell.id
    }

    /// Current number of live references. Zero once finalized.
    pub fn ref_count(&self) -> usize {
        self.cell.refs.load(Ordering::Acquire)
    }

    pub fn is_finalized(&self) -> bool {
        self.ref_count() == 0
    }

    /// Whether both handles refer to the same token.
    pub fn same_owner(&self, other: &OwnerToken) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Add a reference and return a handle for it.
    pub fn acquire(&self) -> Result<OwnerToken, LifetimeError> {
        let mut current = self.cell.refs.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return Err(LifetimeError::UseAfterRelease { owner: self.id() });
            }
            match self.cell.refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(self.clone()),
                Err(observed) => current = observed,
            }
        }
    }

    /// Drop a reference. The decrement that reaches zero runs the deleter
    /// synchronously before returning [`ReleaseOutcome::Finalized`].
    ///
    /// # Safety
    ///
    /// The caller must own the reference it releases: one it acquired, one
    /// handed over by [`OwnerGuard::into_token`] or [`DescriptorParts`], or
    /// the initial reference of [`OwnerToken::new`]. Releasing a reference
    /// held by a guard lets the deleter run under live descriptors and views.
    ///
    /// [`DescriptorParts`]: crate::descriptor::DescriptorParts
    pub unsafe fn release(&self) -> Result<ReleaseOutcome, LifetimeError> {
        let mut current = self.cell.refs.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return Err(LifetimeError::DoubleRelease { owner: self.id() });
            }
            match self.cell.refs.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(1) => break,
                Ok(_) => return Ok(ReleaseOutcome::Live(current - 1)),
                Err(observed) => current = observed,
            }
        }

        let deleter = self
            .cell
            .deleter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(deleter) = deleter {
            deleter();
        }
        tracing::debug!(owner = ?self.id(), "owner finalized");
        Ok(ReleaseOutcome::Finalized)
    }

    /// Acquire a reference held by the returned guard.
    pub fn claim(&self) -> Result<OwnerGuard, LifetimeError> {
        self.acquire().map(OwnerGuard::armed)
    }

    /// Move the reference this handle stands for into a guard, without
    /// touching the count.
    ///
    /// # Safety
    ///
    /// Same as [`release`](Self::release): the guard will release this
    /// reference when dropped, so the caller must own it.
    pub unsafe fn adopt(self) -> OwnerGuard {
        OwnerGuard::armed(self)
    }
}

impl fmt::Debug for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerToken")
            .field("id", &self.id())
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// One counted reference to an [`OwnerToken`], released on drop.
pub struct OwnerGuard {
    token: OwnerToken,
    armed: bool,
}

impl OwnerGuard {
    /// Create a token with a count of 1 and hand that reference to the guard.
    pub fn new<C, F>(context: C, deleter: F) -> Self
    where
        C: Send + 'static,
        F: FnOnce(C) + Send + 'static,
    {
        OwnerGuard::armed(OwnerToken::new(context, deleter))
    }

    fn armed(token: OwnerToken) -> Self {
        OwnerGuard { token, armed: true }
    }

    pub fn token(&self) -> &OwnerToken {
        &self.token
    }

    /// Whether this guard holds a reference. Only a [`Clone`] that found the
    /// token finalized produces a guard without one.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Take another reference, reporting a finalized token instead of
    /// deferring to the [`LifetimePolicy`](config::LifetimePolicy).
    pub fn try_clone(&self) -> Result<OwnerGuard, LifetimeError> {
        self.token.claim()
    }

    /// Give up RAII management: the returned handle still stands for this
    /// guard's reference, which the holder must `release` itself. This is how
    /// a reference is handed to a foreign runtime.
    pub fn into_token(mut self) -> OwnerToken {
        self.armed = false;
        self.token.clone()
    }
}

impl Clone for OwnerGuard {
    /// Acquires another reference. If the token was already finalized the
    /// violation goes to the configured `LifetimePolicy` and, when that does
    /// not panic, the clone comes back disarmed; see [`OwnerGuard::try_clone`].
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(guard) => guard,
            Err(err) => {
                config::global().lifetime_policy.handle(err);
                OwnerGuard {
                    token: self.token.clone(),
                    armed: false,
                }
            }
        }
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // SAFETY: an armed guard owns exactly one reference.
        if let Err(err) = unsafe { self.token.release() } {
            config::global().lifetime_policy.handle(err);
        }
    }
}

impl fmt::Debug for OwnerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnerGuard").field(&self.token).finish()
    }
}
