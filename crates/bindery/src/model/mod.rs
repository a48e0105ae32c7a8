//! Observable attribute documents with change tracking and
//! server persistence.
//!
//! # Modules
//!
//! - [`attributes`]: [`Attributes`] alias and the [`Update`] argument union.
//! - [`options`]: [`SetOptions`], [`ModelOptions`], [`ModelBuilder`], hook types.
//! - [`event`]: [`ModelEvent`] payload and event names.
//! - [`escape`]: HTML escaping used by [`Model::escape`].
//! - [`engine`]: [`Model`] and its mutation/broadcast engine.
//! - [`persistence`]: `fetch`/`save`/`destroy` and [`wrap_error`].

pub mod attributes;
pub mod engine;
pub mod escape;
pub mod event;
pub mod options;
pub mod persistence;

pub use attributes::{Attributes, Update};
pub use engine::{Model, ModelCallback, Phase};
pub use escape::escape_html;
pub use event::{change_event, ModelEvent, CHANGE, DESTROY, ERROR, SYNC};
pub use options::{ModelBuilder, ModelOptions, Parser, SetOptions, Validator, DEFAULT_ID_ATTRIBUTE};
pub use persistence::wrap_error;
