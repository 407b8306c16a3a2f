//! Cleanup hooks registered by transports.

use std::fmt;

pub(crate) type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Ordered cleanup hooks for one connection attempt.
///
/// Running the hooks consumes the list, so each hook runs at most once.
#[derive(Default)]
pub struct UnsubscribeHooks {
    hooks: Vec<Hook>,
}

impl UnsubscribeHooks {
    /// Create an empty hook list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook.
    pub fn push(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.push_boxed(Box::new(hook));
    }

    /// Register a hook that is already boxed.
    pub(crate) fn push_boxed(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Invoke every hook in registration order.
    pub fn run(self) {
        for hook in self.hooks {
            hook();
        }
    }
}

impl fmt::Debug for UnsubscribeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsubscribeHooks")
            .field("len", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    #[test]
    fn test_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = UnsubscribeHooks::new();
        for i in 0..3 {
            let order = order.clone();
            hooks.push(move || order.lock().push(i));
        }
        assert_eq!(hooks.len(), 3);

        hooks.run();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_boxed_and_plain_hooks_share_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = UnsubscribeHooks::new();

        let first = order.clone();
        hooks.push(move || first.lock().push("plain"));
        let second = order.clone();
        let boxed: Hook = Box::new(move || second.lock().push("boxed"));
        hooks.push_boxed(boxed);

        hooks.run();
        assert_eq!(*order.lock(), vec!["plain", "boxed"]);
    }

    #[test]
    fn test_empty() {
        let hooks = UnsubscribeHooks::new();
        assert!(hooks.is_empty());
        hooks.run();
    }
}
