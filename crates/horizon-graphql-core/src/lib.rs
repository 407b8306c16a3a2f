//! Reactive cells for Horizon GraphQL.
//!
//! Subscription sessions publish their state, data and error through
//! [`Observable`] cells; callers watch them through [`ReadOnlyObservable`]
//! views. Both are built on [`Signal`], a thread-safe callback list.
//!
//! ```
//! use horizon_graphql_core::Observable;
//!
//! let status = Observable::new("closed");
//! let view = status.read_only();
//!
//! view.subscribe(|s| println!("status: {s}"));
//! status.set("open");
//! assert_eq!(view.get(), "open");
//! ```

pub mod observable;
pub mod signal;

pub use observable::{Observable, ReadOnlyObservable};
pub use signal::{ConnectionId, Signal};
