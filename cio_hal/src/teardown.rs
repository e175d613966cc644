//! Runtime teardown hooks.
//!
//! Components that hold hardware resources register a named hook here; the
//! binary runs every hook once when the robot runtime shuts down (normal exit
//! or Ctrl-C). Hooks run in reverse registration order.

use parking_lot::Mutex;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Boxed teardown action.
pub type TeardownHook = Box<dyn FnOnce() + Send>;

/// Process-scoped registry used by controllers constructed without an
/// explicit registry.
static GLOBAL_TEARDOWN: LazyLock<TeardownRegistry> = LazyLock::new(TeardownRegistry::new);

/// Ordered list of named teardown hooks.
#[derive(Default)]
pub struct TeardownRegistry {
    hooks: Mutex<Vec<(String, TeardownHook)>>,
}

impl TeardownRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-scoped registry.
    pub fn global() -> &'static TeardownRegistry {
        &GLOBAL_TEARDOWN
    }

    /// Register a hook to run at teardown.
    pub fn register(&self, name: impl Into<String>, hook: TeardownHook) {
        let name = name.into();
        debug!("Registered teardown hook '{}'", name);
        self.hooks.lock().push((name, hook));
    }

    /// Number of pending hooks.
    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    /// Returns `true` if no hooks are pending.
    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }

    /// Run and drain all hooks, last registered first.
    ///
    /// Returns the number of hooks run. Hooks registered while running are
    /// kept for the next call.
    pub fn run_all(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        let count = hooks.len();
        for (name, hook) in hooks.into_iter().rev() {
            debug!("Running teardown hook '{}'", name);
            hook();
        }
        if count > 0 {
            info!("Teardown complete ({} hooks)", count);
        }
        count
    }
}
