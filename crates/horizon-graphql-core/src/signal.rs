//! Change notification.
//!
//! A [`Signal<Args>`] keeps a table of slots and calls each of them, oldest
//! connection first, on [`emit`](Signal::emit). It is the notification half
//! of an [`Observable`](crate::Observable).
//!
//! Slots run on the emitting thread after the table lock is released, so a
//! slot may connect or disconnect slots on the signal that is calling it.
//! Such changes apply from the next emission on.
//!
//! ```
//! use horizon_graphql_core::Signal;
//!
//! let state_changed = Signal::<&'static str>::new();
//! let id = state_changed.connect(|state| println!("now {state}"));
//!
//! state_changed.emit("connected");
//! state_changed.disconnect(id);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle for one connected slot, valid until it is disconnected.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A list of callbacks notified with `&Args`.
///
/// `Send + Sync`; emit from any thread.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

static_assertions::assert_impl_all!(Signal<String>: Send, Sync);

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Register `slot`; it is called on every later emission.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Remove a slot. Returns `false` if `id` was already disconnected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Call every connected slot with `args`.
    pub fn emit(&self, args: Args) {
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(
            target: "horizon_graphql_core::signal",
            slots = slots.len(),
            "emit"
        );
        for slot in slots {
            slot(&args);
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}
