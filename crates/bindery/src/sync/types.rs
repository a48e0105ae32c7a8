//! Sync-specific types: bridge and transport traits, request settings, and
//! the error/response shapes shared by models and bridges.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Attributes, Model};

// ============================================================================
// Verbs
// ============================================================================

/// CRUD intent of a sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Create,
    Update,
    Delete,
    Read,
}

impl Method {
    /// Default HTTP verb for this intent.
    pub fn http_verb(self) -> HttpVerb {
        match self {
            Self::Create => HttpVerb::Post,
            Self::Update => HttpVerb::Put,
            Self::Delete => HttpVerb::Delete,
            Self::Read => HttpVerb::Get,
        }
    }

    /// Whether requests for this intent carry the model document as body.
    pub fn sends_body(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SyncBridge: translates a CRUD intent into a transport call
// ============================================================================

/// Pluggable persistence bridge injected into a model at construction.
#[async_trait]
pub trait SyncBridge: Send + Sync {
    async fn sync(
        &self,
        method: Method,
        model: &Model,
        options: &SyncOptions,
    ) -> std::result::Result<SyncResponse, SyncError>;
}

// ============================================================================
// Transport: user-provided request/response channel
// ============================================================================

/// Abstract request/response channel used by [`HttpBridge`](super::HttpBridge).
/// Implementations own the actual network I/O.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, SyncError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub verb: HttpVerb,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Encoded body; `None` for GET/DELETE.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Raw body text; empty means no content.
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Transport metadata handed to the parse hook alongside the body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

/// A successful bridge result.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResponse {
    pub body: Value,
    pub meta: ResponseMeta,
}

impl SyncResponse {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            meta: ResponseMeta {
                status: 200,
                headers: BTreeMap::new(),
            },
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Classification of sync failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// The channel itself failed (connection refused, timeout, ...).
    Transport,
    /// The server answered with a non-success status.
    Status,
    /// No URL could be derived for the request.
    MissingUrl,
    /// The server answered successfully but its document was unusable.
    MalformedResponse,
}

/// A failed sync call. This is the `response` delivered to error callbacks
/// and `"error"` listeners.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SyncError {
    pub message: String,
    pub kind: SyncErrorKind,
    pub status: Option<u16>,
    pub body: Option<Value>,
}

impl SyncError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(message, SyncErrorKind::Transport)
    }

    pub fn with_kind(message: impl Into<String>, kind: SyncErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
            body: None,
        }
    }

    pub fn status(status: u16, body: Option<Value>) -> Self {
        Self {
            message: format!("Request failed with status {status}"),
            kind: SyncErrorKind::Status,
            status: Some(status),
            body,
        }
    }
}

// ============================================================================
// Per-call options
// ============================================================================

/// Overrides for fields the bridge would otherwise derive. Caller values win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSettings {
    pub verb: Option<HttpVerb>,
    pub url: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Document to send instead of the model's current attributes.
    pub attrs: Option<Attributes>,
    pub content_type: Option<String>,
}

/// Callback run with the raw server body after a successful call.
pub type SuccessCallback = dyn Fn(&Model, &Value, &SyncOptions) + Send + Sync;

/// Callback run with the failure of a call.
pub type ErrorCallback = dyn Fn(&Model, &SyncError, &SyncOptions) + Send + Sync;

/// Options for `fetch`, `save`, and `destroy`.
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Defer local commit until the server confirms.
    pub wait: bool,
    /// Commit server attributes without broadcasting change events.
    pub silent: bool,
    pub settings: RequestSettings,
    pub success: Option<Arc<SuccessCallback>>,
    pub error: Option<Arc<ErrorCallback>>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(mut self) -> Self {
        self.wait = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn settings(mut self, settings: RequestSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn on_success(
        mut self,
        callback: impl Fn(&Model, &Value, &SyncOptions) + Send + Sync + 'static,
    ) -> Self {
        self.success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(
        mut self,
        callback: impl Fn(&Model, &SyncError, &SyncOptions) + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("wait", &self.wait)
            .field("silent", &self.silent)
            .field("settings", &self.settings)
            .field("success", &self.success.as_ref().map(|_| "<fn>"))
            .field("error", &self.error.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
