//! Observable value cells.
//!
//! An [`Observable<T>`] pairs a value with a change [`Signal`]. Writing a
//! value that differs from the current one stores it and then notifies
//! every subscriber with the new value; writing an equal value is a no-op.
//!
//! Cells are cheap handles: cloning an `Observable` yields another handle to
//! the same value. Hand out a [`ReadOnlyObservable`] when the receiver must
//! be able to watch a cell but not write it.
//!
//! # Example
//!
//! ```
//! use horizon_graphql_core::Observable;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let count = Observable::new(0);
//! let notified = Arc::new(AtomicUsize::new(0));
//!
//! let notified_clone = notified.clone();
//! count.subscribe(move |_| {
//!     notified_clone.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! assert!(count.set(1));
//! assert!(!count.set(1)); // unchanged, no notification
//! assert_eq!(count.get(), 1);
//! assert_eq!(notified.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::signal::{ConnectionId, Signal};

struct Inner<T> {
    value: RwLock<T>,
    changed: Signal<T>,
}

/// A shared value cell with change notification.
///
/// # Thread Safety
///
/// `Observable<T>` is `Send + Sync` when `T` is. Subscribers run on the
/// thread that performed the write, after the write lock is released.
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

static_assertions::assert_impl_all!(Observable<Option<String>>: Send, Sync);

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Observable<T> {
    /// Create a new cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(value),
                changed: Signal::new(),
            }),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.inner.value.read())
    }

    /// Store `value`, returning `true` and notifying subscribers if it
    /// differs from the current value.
    pub fn set(&self, value: T) -> bool {
        self.replace(value).is_some()
    }

    /// Store `value`, returning the previous value if it changed.
    ///
    /// Subscribers are notified only when a previous value is returned.
    pub fn replace(&self, value: T) -> Option<T> {
        let old = {
            let mut current = self.inner.value.write();
            if *current == value {
                return None;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.inner.changed.emit(value);
        Some(old)
    }

    /// Call `slot` with every new value stored in this cell.
    pub fn subscribe<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.changed.connect(slot)
    }

    /// Remove a subscription made with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        self.inner.changed.disconnect(id)
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.changed.connection_count()
    }

    /// A read-only handle to this cell.
    pub fn read_only(&self) -> ReadOnlyObservable<T> {
        ReadOnlyObservable {
            cell: self.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Default + Send + Sync + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

/// A read-only view of an [`Observable`].
///
/// Readers can get the value and subscribe to changes; only the owner of
/// the underlying cell can write.
pub struct ReadOnlyObservable<T> {
    cell: Observable<T>,
}

impl<T> Clone for ReadOnlyObservable<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ReadOnlyObservable<T> {
    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Access the value through a closure.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.cell.with(f)
    }

    /// Call `slot` with every new value stored in the cell.
    pub fn subscribe<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.cell.subscribe(slot)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        self.cell.unsubscribe(id)
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyObservable").field(&self.cell).finish()
    }
}
