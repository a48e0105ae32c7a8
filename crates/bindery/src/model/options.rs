//! Model configuration, hook types, and per-call `set` options.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    error::ValidationError,
    sync::types::{ResponseMeta, SyncBridge},
};

use super::{attributes::Attributes, engine::Model};

/// Default name of the identifier attribute.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// Validate hook: receives the full proposed document.
pub type Validator = dyn Fn(&Attributes) -> Result<(), ValidationError> + Send + Sync;

/// Parse hook: maps a raw server body to an attribute document.
pub type Parser = dyn Fn(Value, &ResponseMeta) -> Value + Send + Sync;

/// Options for a single `set`/`unset`/`clear` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Record the change without broadcasting it.
    pub silent: bool,
    /// Delete the given keys instead of assigning them.
    pub unset: bool,
}

impl SetOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            unset: false,
        }
    }
}

/// Configuration for [`Model`].
#[derive(Clone, Default)]
pub struct ModelOptions {
    /// Attribute that carries the model's identity (default: `"id"`).
    pub id_attribute: Option<String>,
    /// Collection endpoint; the model URL is `<url_root>/<id>`.
    pub url_root: Option<String>,
    /// Fixed URL, taking precedence over `url_root`.
    pub url: Option<String>,
    /// Attributes laid under the initial document.
    pub defaults: Option<Attributes>,
    pub validate: Option<Arc<Validator>>,
    pub parse: Option<Arc<Parser>>,
    pub bridge: Option<Arc<dyn SyncBridge>>,
}

impl std::fmt::Debug for ModelOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelOptions")
            .field("id_attribute", &self.id_attribute)
            .field("url_root", &self.url_root)
            .field("url", &self.url)
            .field("defaults", &self.defaults)
            .field("validate", &self.validate.as_ref().map(|_| "<fn>"))
            .field("parse", &self.parse.as_ref().map(|_| "<fn>"))
            .field("bridge", &self.bridge.as_ref().map(|_| "<bridge>"))
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent construction of a [`Model`].
#[derive(Debug, Default)]
pub struct ModelBuilder {
    options: ModelOptions,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_attribute(mut self, name: impl Into<String>) -> Self {
        self.options.id_attribute = Some(name.into());
        self
    }

    pub fn url_root(mut self, url_root: impl Into<String>) -> Self {
        self.options.url_root = Some(url_root.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.options.url = Some(url.into());
        self
    }

    /// Non-object values are ignored.
    pub fn defaults(mut self, defaults: Value) -> Self {
        if let Value::Object(doc) = defaults {
            self.options.defaults = Some(doc);
        }
        self
    }

    pub fn validate(
        mut self,
        validate: impl Fn(&Attributes) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        self.options.validate = Some(Arc::new(validate));
        self
    }

    pub fn parse(
        mut self,
        parse: impl Fn(Value, &ResponseMeta) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.options.parse = Some(Arc::new(parse));
        self
    }

    pub fn bridge(mut self, bridge: Arc<dyn SyncBridge>) -> Self {
        self.options.bridge = Some(bridge);
        self
    }

    /// Build the model with `attrs` as its initial (and baseline) document.
    /// Non-object values build an empty model.
    pub fn build(self, attrs: Value) -> Model {
        Model::with_options(attrs, self.options)
    }
}
