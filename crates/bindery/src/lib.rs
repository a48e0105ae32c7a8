//! Observable attribute models over a pluggable persistence bridge.
//!
//! A [`Model`] holds a key→value document, diffs every update against both
//! its current state and its server baseline, and announces changes through
//! its own [`Events`] dispatcher. `fetch`/`save`/`destroy` round-trip the
//! document through an injected [`SyncBridge`]; [`HttpBridge`] is the default
//! REST mapping over any [`Transport`].

pub mod error;
pub mod events;
pub mod model;
pub mod sync;

pub use error::{ModelError, Result, ValidationError};
pub use events::{Events, ListenerId, ALL_EVENTS};
pub use model::{Attributes, Model, ModelBuilder, ModelEvent, SetOptions, Update};
pub use sync::{HttpBridge, SyncBridge, SyncError, SyncOptions, Transport};
