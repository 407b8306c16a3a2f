//! Subscription sessions.
//!
//! [`SubscriptionDefinition`] validates a subscription document once;
//! [`SubscriptionDefinition::subscribe`] starts a [`SubscriptionSession`]
//! that exposes reactive state, data and error cells.
//!
//! # Lifecycle
//!
//! ```text
//!            open / restart                first result
//!  Pending ────────────────► Pending ─────────────────► Connected
//!     ▲                                                    │
//!     │ restart / refresh          close, error, complete  │
//!  Closed ◄────────────────────────────────────────────────┘
//! ```
//!
//! `restart` tears the connection down and opens a new one under a fresh
//! [`Epoch`]; anything still in flight from the old connection is dropped.
//! `refresh` opens a new connection alongside the old one and swaps over
//! when the new one delivers its first result, so observers never see the
//! session leave `Connected`.

mod definition;
mod epoch;
mod hooks;
mod session;
mod sink;
mod state;

pub use definition::{SubscribeOptions, SubscriptionDefinition};
pub use epoch::{Epoch, EpochGuard};
pub use hooks::UnsubscribeHooks;
pub use session::{Handoff, SubscriptionSession};
pub use sink::EventSink;
pub use state::SubscriptionState;
