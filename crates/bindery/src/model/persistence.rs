//! Persistence protocol: `fetch`, `save`, `destroy` over the model's
//! [`SyncBridge`](crate::sync::SyncBridge).
//!
//! Every failure is delivered twice: as the `Err` of the returned future, and
//! through the error wrapper (the caller's error callback, or an `"error"`
//! event on the model when none was supplied).

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{
    error::{ModelError, Result, ValidationError},
    sync::types::{ErrorCallback, Method, SyncError, SyncErrorKind, SyncOptions, SyncResponse},
};

use super::{
    attributes::{merged, Update},
    engine::Model,
    event::{ModelEvent, DESTROY, ERROR, SYNC},
    options::SetOptions,
};

/// Decorate the caller's error callback so that, absent one, failures are
/// re-broadcast as an `"error"` event on the originating model.
pub fn wrap_error(options: &SyncOptions) -> Arc<ErrorCallback> {
    match &options.error {
        Some(callback) => Arc::clone(callback),
        None => {
            let rebroadcast: Arc<ErrorCallback> =
                Arc::new(|model: &Model, error: &SyncError, options: &SyncOptions| {
                    let event = ModelEvent::Error {
                        error: error.clone(),
                        options: options.clone(),
                    };
                    model.trigger(ERROR, &event);
                });
            rebroadcast
        }
    }
}

impl Model {
    /// Read the model from the server and commit the parsed response.
    ///
    /// A response the model rejects counts as a failure even though the
    /// transport succeeded: the success callback does not run.
    pub async fn fetch(&self, options: SyncOptions) -> Result<()> {
        let bridge = self.bridge().cloned().ok_or(ModelError::NoBridge)?;
        tracing::debug!(cid = %self.cid(), "fetch");

        let response = match bridge.sync(Method::Read, self, &options).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error, &options)),
        };

        let SyncResponse { body, meta } = response;
        let parsed = self.parse_response(body.clone(), &meta);
        self.commit_response(parsed, &options)?;

        if let Some(success) = &options.success {
            success(self, &body, &options);
        }
        Ok(())
    }

    /// Persist the model, optionally applying `update` first.
    ///
    /// Immediate mode commits `update` locally before the request and aborts
    /// without a request when validation rejects it. Wait mode validates the
    /// proposed document, sends it, and commits only once the server
    /// confirms, with server attributes taking precedence. A proposed id
    /// decides the verb and endpoint before anything is committed.
    pub async fn save(&self, update: impl Into<Update>, options: SyncOptions) -> Result<()> {
        let bridge = self.bridge().cloned().ok_or(ModelError::NoBridge)?;
        let proposed = update.into().into_attributes();
        let set_options = SetOptions {
            silent: options.silent,
            unset: false,
        };

        let mut request_options = options.clone();
        let is_new = if options.wait {
            let document = merged(&self.attributes(), &proposed);
            self.validate_attributes(&document)?;
            let id = document
                .get(self.id_attribute())
                .filter(|v| !v.is_null())
                .cloned();
            if request_options.settings.url.is_none() && id != self.id() {
                request_options.settings.url = self.url_for(id.as_ref());
            }
            if request_options.settings.attrs.is_none() {
                request_options.settings.attrs = Some(document);
            }
            id.is_none()
        } else {
            if !proposed.is_empty() {
                self.set(Update::Document(proposed.clone()), set_options)?;
            }
            self.is_new()
        };

        let method = if is_new {
            Method::Create
        } else {
            Method::Update
        };
        tracing::debug!(cid = %self.cid(), ?method, wait = options.wait, "save");

        let response = match bridge.sync(method, self, &request_options).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error, &options)),
        };

        let SyncResponse { body, meta } = response;
        let mut parsed = self.parse_response(body.clone(), &meta);
        if options.wait {
            parsed = match parsed {
                Value::Object(server) => Value::Object(merged(&proposed, &server)),
                Value::Null => Value::Object(proposed),
                other => other,
            };
        }
        self.commit_response(parsed, &options)?;
        self.succeed(&body, &options);
        Ok(())
    }

    /// Delete the model on the server and announce `"destroy"`.
    ///
    /// A model that was never saved is destroyed locally without a request.
    /// Without `wait`, `"destroy"` fires before the request is sent.
    pub async fn destroy(&self, options: SyncOptions) -> Result<()> {
        let destroyed = ModelEvent::Destroyed {
            options: options.clone(),
        };
        if self.is_new() {
            self.trigger(DESTROY, &destroyed);
            return Ok(());
        }

        let bridge = self.bridge().cloned().ok_or(ModelError::NoBridge)?;
        if !options.wait {
            self.trigger(DESTROY, &destroyed);
        }
        tracing::debug!(cid = %self.cid(), wait = options.wait, "destroy");

        let response = match bridge.sync(Method::Delete, self, &options).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error, &options)),
        };

        if options.wait {
            self.trigger(DESTROY, &destroyed);
        }
        self.succeed(&response.body, &options);
        Ok(())
    }

    /// Issue `fetch` on the ambient tokio runtime and return at once.
    ///
    /// Dropping the handle does not cancel the request.
    pub fn spawn_fetch(self: &Arc<Self>, options: SyncOptions) -> JoinHandle<Result<()>> {
        let model = Arc::clone(self);
        tokio::spawn(async move { model.fetch(options).await })
    }

    /// Issue `save` on the ambient tokio runtime and return at once.
    pub fn spawn_save(
        self: &Arc<Self>,
        update: impl Into<Update>,
        options: SyncOptions,
    ) -> JoinHandle<Result<()>> {
        let model = Arc::clone(self);
        let update = update.into();
        tokio::spawn(async move { model.save(update, options).await })
    }

    /// Issue `destroy` on the ambient tokio runtime and return at once.
    pub fn spawn_destroy(self: &Arc<Self>, options: SyncOptions) -> JoinHandle<Result<()>> {
        let model = Arc::clone(self);
        tokio::spawn(async move { model.destroy(options).await })
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Commit a parsed server document. `null` means nothing to apply; any
    /// other non-document, or a validation rejection, is a malformed response.
    fn commit_response(&self, parsed: Value, options: &SyncOptions) -> Result<()> {
        let set_options = SetOptions {
            silent: options.silent,
            unset: false,
        };
        let outcome = match parsed {
            Value::Null => Ok(false),
            Value::Object(doc) => self.set(Update::Document(doc), set_options),
            other => Err(ModelError::Validation(ValidationError::new(format!(
                "expected an attribute document, received {other}"
            )))),
        };
        match outcome {
            Ok(_) => Ok(()),
            Err(ModelError::Validation(source)) => {
                tracing::warn!(cid = %self.cid(), error = %source, "server response rejected");
                let error =
                    SyncError::with_kind(source.to_string(), SyncErrorKind::MalformedResponse);
                wrap_error(options)(self, &error, options);
                Err(ModelError::MalformedResponse { source })
            }
            Err(other) => Err(other),
        }
    }

    fn fail(&self, error: SyncError, options: &SyncOptions) -> ModelError {
        tracing::debug!(cid = %self.cid(), error = %error, "sync failed");
        wrap_error(options)(self, &error, options);
        ModelError::Sync(error)
    }

    /// Success callback when supplied, otherwise a `"sync"` event.
    fn succeed(&self, body: &Value, options: &SyncOptions) {
        match &options.success {
            Some(success) => success(self, body, options),
            None => {
                let event = ModelEvent::Synced {
                    response: body.clone(),
                    options: options.clone(),
                };
                self.trigger(SYNC, &event);
            }
        }
    }
}
