//! ModelEvent, the payload delivered with every model broadcast.
//!
//! Listeners receive `(&Model, &ModelEvent)`; the variant determines the
//! event name it was triggered under.

use std::borrow::Cow;

use serde_json::Value;

use crate::sync::types::{SyncError, SyncOptions};

use super::options::SetOptions;

pub const CHANGE: &str = "change";
pub const ERROR: &str = "error";
pub const SYNC: &str = "sync";
pub const DESTROY: &str = "destroy";

/// Name of the per-attribute change event for `attr`.
pub fn change_event(attr: &str) -> String {
    format!("{CHANGE}:{attr}")
}

#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// `"change:<attr>"`: `value` is `None` when the attribute was removed.
    AttributeChanged {
        attr: String,
        value: Option<Value>,
        options: SetOptions,
    },
    /// `"change"`: one aggregate event per broadcast pass.
    Changed { options: SetOptions },
    /// `"error"`: a sync call failed and no error callback was supplied.
    Error {
        error: SyncError,
        options: SyncOptions,
    },
    /// `"sync"`: a save/destroy succeeded and no success callback was supplied.
    Synced {
        response: Value,
        options: SyncOptions,
    },
    /// `"destroy"`: the model was destroyed.
    Destroyed { options: SyncOptions },
}

impl ModelEvent {
    /// The event name this payload is triggered under.
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Self::AttributeChanged { attr, .. } => Cow::Owned(change_event(attr)),
            Self::Changed { .. } => Cow::Borrowed(CHANGE),
            Self::Error { .. } => Cow::Borrowed(ERROR),
            Self::Synced { .. } => Cow::Borrowed(SYNC),
            Self::Destroyed { .. } => Cow::Borrowed(DESTROY),
        }
    }

    /// The attribute a per-attribute change refers to.
    pub fn attr(&self) -> Option<&str> {
        match self {
            Self::AttributeChanged { attr, .. } => Some(attr),
            _ => None,
        }
    }
}
