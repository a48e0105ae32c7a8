//! Event dispatch: named-event subscriptions with per-listener context.
//!
//! # Modules
//!
//! - [`dispatcher`]: Generic pub/sub registry ([`Events<O, A>`]).

pub mod dispatcher;

pub use dispatcher::{Callback, Events, ListenerId, ALL_EVENTS};
