//! Process-wide controller lock.
//!
//! Every `DeviceController` in the process shares one mutual-exclusion
//! primitive, independent of which device path it addresses. Multi-step
//! operations (bank read-modify-write, semaphore-guarded transfers) take a
//! [`ProcessLockGuard`] as proof that the caller holds it for the whole
//! sequence.
//!
//! The lock is an explicit handle. [`ProcessLock::global`] returns the handle
//! owned by the process-scoped registry; tests inject private locks with
//! [`ProcessLock::new`].

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Process-scoped lock, created on first use and never destroyed.
static PROCESS_LOCK: LazyLock<ProcessLock> = LazyLock::new(ProcessLock::new);

/// Cloneable handle to a shared mutex.
#[derive(Clone, Default)]
pub struct ProcessLock {
    inner: Arc<Mutex<()>>,
}

impl ProcessLock {
    /// Create an independent lock (for injection in tests or sub-systems).
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-wide lock.
    pub fn global() -> Self {
        PROCESS_LOCK.clone()
    }

    /// Block until the lock is held. Released when the guard drops.
    pub fn lock(&self) -> ProcessLockGuard<'_> {
        ProcessLockGuard {
            _guard: self.inner.lock(),
            owner: self,
        }
    }

    /// Acquire without blocking; `None` if another caller holds it.
    pub fn try_lock(&self) -> Option<ProcessLockGuard<'_>> {
        self.inner.try_lock().map(|guard| ProcessLockGuard {
            _guard: guard,
            owner: self,
        })
    }

    /// Returns `true` if some caller currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Returns `true` if both handles refer to the same mutex.
    pub fn same_as(&self, other: &ProcessLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ProcessLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Scoped proof of holding a [`ProcessLock`].
pub struct ProcessLockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    owner: &'a ProcessLock,
}

impl ProcessLockGuard<'_> {
    /// Returns `true` if this guard was issued by `lock`.
    pub fn is_for(&self, lock: &ProcessLock) -> bool {
        self.owner.same_as(lock)
    }
}

impl fmt::Debug for ProcessLockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProcessLockGuard")
    }
}
