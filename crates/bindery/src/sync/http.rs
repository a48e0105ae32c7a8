//! HttpBridge: the default REST mapping from CRUD intents to HTTP requests.
//!
//! `create → POST`, `update → PUT`, `delete → DELETE`, `read → GET`. Bodies
//! for create/update are the JSON document of the model (or of
//! `RequestSettings::attrs`). Everything derived here can be overridden per
//! call through [`RequestSettings`](super::RequestSettings).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::Model;

use super::types::*;

const CONTENT_TYPE: &str = "Content-Type";
const METHOD_OVERRIDE: &str = "X-HTTP-Method-Override";
const JSON_CONTENT: &str = "application/json";
const FORM_CONTENT: &str = "application/x-www-form-urlencoded";

/// Configuration for [`HttpBridge`].
#[derive(Debug, Clone, Default)]
pub struct HttpBridgeOptions {
    /// Send PUT/DELETE as POST with an `X-HTTP-Method-Override` header.
    pub emulate_http: bool,
    /// Send the document as a `model=<json>` form field instead of a JSON body.
    pub emulate_json: bool,
    /// Headers added to every request before derived and per-call headers.
    pub default_headers: BTreeMap<String, String>,
}

pub struct HttpBridge {
    transport: Arc<dyn Transport>,
    options: HttpBridgeOptions,
}

impl HttpBridge {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(transport, HttpBridgeOptions::default())
    }

    pub fn with_options(transport: Arc<dyn Transport>, options: HttpBridgeOptions) -> Self {
        Self { transport, options }
    }

    /// Derive the request for `method` on `model`, applying per-call overrides.
    pub fn build_request(
        &self,
        method: Method,
        model: &Model,
        options: &SyncOptions,
    ) -> Result<HttpRequest, SyncError> {
        let settings = &options.settings;
        let mut verb = settings.verb.unwrap_or_else(|| method.http_verb());
        let url = settings.url.clone().or_else(|| model.url()).ok_or_else(|| {
            SyncError::with_kind(
                "A url_root or url must be configured for this model",
                SyncErrorKind::MissingUrl,
            )
        })?;

        let mut headers = self.options.default_headers.clone();
        let mut form: Vec<String> = Vec::new();
        let mut body = None;

        if method.sends_body() {
            let document = settings
                .attrs
                .clone()
                .unwrap_or_else(|| model.attributes());
            let json = Value::Object(document).to_string();
            if self.options.emulate_json {
                form.push(format!("model={}", urlencoding::encode(&json)));
            } else {
                let content_type = settings
                    .content_type
                    .clone()
                    .unwrap_or_else(|| JSON_CONTENT.to_string());
                headers.insert(CONTENT_TYPE.to_string(), content_type);
                body = Some(json);
            }
        }

        if self.options.emulate_http && matches!(verb, HttpVerb::Put | HttpVerb::Delete) {
            if self.options.emulate_json {
                form.push(format!("_method={}", verb.as_str()));
            }
            headers.insert(METHOD_OVERRIDE.to_string(), verb.as_str().to_string());
            verb = HttpVerb::Post;
        }

        if !form.is_empty() {
            let content_type = settings
                .content_type
                .clone()
                .unwrap_or_else(|| FORM_CONTENT.to_string());
            headers.insert(CONTENT_TYPE.to_string(), content_type);
            body = Some(form.join("&"));
        }

        headers.extend(settings.headers.clone());

        Ok(HttpRequest {
            verb,
            url,
            headers,
            body,
        })
    }
}

#[async_trait]
impl SyncBridge for HttpBridge {
    async fn sync(
        &self,
        method: Method,
        model: &Model,
        options: &SyncOptions,
    ) -> Result<SyncResponse, SyncError> {
        let request = self.build_request(method, model, options)?;
        tracing::debug!(?method, verb = %request.verb, url = %request.url, "sync request");

        let response = self.transport.send(request).await?;
        let meta = ResponseMeta {
            status: response.status,
            headers: response.headers.clone(),
        };

        if !response.is_success() {
            let body = decode_body(&response.body)
                .unwrap_or_else(|_| Value::String(response.body.clone()));
            let body = (!body.is_null()).then_some(body);
            return Err(SyncError::status(response.status, body));
        }

        let body = decode_body(&response.body).map_err(|e| {
            SyncError::with_kind(
                format!("Response body is not valid JSON: {e}"),
                SyncErrorKind::MalformedResponse,
            )
        })?;
        Ok(SyncResponse { body, meta })
    }
}

/// Empty (or whitespace-only) bodies decode to `null`.
fn decode_body(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw)
}
