//! Model: an observable attribute store with change tracking.
//!
//! # Change bookkeeping
//!
//! Three notions of "changed" are kept apart:
//!   - the keys a single `set` call altered versus the current document
//!     (announced as `"change:<attr>"` by that call's broadcast),
//!   - `pending`: keys diverging from the baseline that have not been
//!     announced yet,
//!   - `changed`: every key whose value or presence differs from the
//!     baseline (`previous`).
//!
//! The baseline is taken at construction and refreshed when a broadcast pass
//! completes, so listeners see `changed` and `previous` relative to the
//! document as it stood before the cycle. Keys written silently are not
//! announced and keep their old baseline until a loud write or a revert.
//!
//! # Threading model
//!
//! All state lives behind one `parking_lot::Mutex`, which is never held while
//! hooks or listeners run. Listeners may therefore call back into the model.
//! `set` validates outside the lock and commits only if the document has not
//! moved in the meantime; otherwise it validates again.
//!
//! # Re-entrancy
//!
//! A `set` issued while a broadcast pass is running is coalesced: its
//! mutation is applied at once, and its keys are announced by the outer pass
//! before that pass fires its aggregate `"change"`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    error::{Result, ValidationError},
    events::{Callback, Events, ListenerId},
    sync::types::{ResponseMeta, SyncBridge},
};

use super::{
    attributes::{apply_entries, Attributes, Entry, Update},
    escape::{display_value, escape_html},
    event::{change_event, ModelEvent, CHANGE},
    options::{ModelBuilder, ModelOptions, Parser, SetOptions, Validator, DEFAULT_ID_ATTRIBUTE},
};

static NEXT_CID: AtomicU64 = AtomicU64::new(1);

/// Listener type for model events.
pub type ModelCallback = Callback<Model, ModelEvent>;

/// Mutation-cycle state of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Diffing and committing an update (only observable under the lock).
    Mutating,
    /// Listeners are being notified; nested `set` calls are coalesced.
    Broadcasting,
}

#[derive(Debug, Default)]
struct ModelState {
    id: Option<Value>,
    attributes: Attributes,
    /// Server baseline.
    previous: Attributes,
    /// Divergence from the baseline. Removed attributes appear as `null`.
    changed: Attributes,
    pending: IndexSet<String>,
    /// Keys written silently that still diverge from the baseline.
    silent: IndexSet<String>,
    escaped: HashMap<String, String>,
    phase: Phase,
    /// Keys waiting for their `"change:<attr>"` announcement.
    queued: IndexSet<String>,
    /// Bumped by every commit; lets `set` detect a document that moved
    /// while it was being validated.
    version: u64,
}

pub struct Model {
    cid: String,
    id_attribute: String,
    url_root: Option<String>,
    url: Option<String>,
    validate: Option<Arc<Validator>>,
    parse: Option<Arc<Parser>>,
    bridge: Option<Arc<dyn SyncBridge>>,
    state: Mutex<ModelState>,
    events: Events<Model, ModelEvent>,
}

impl Model {
    /// A model with default configuration and no sync bridge.
    pub fn new(attrs: Value) -> Self {
        Self::with_options(attrs, ModelOptions::default())
    }

    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    /// Build a model from `options`. Defaults are laid under `attrs`; the
    /// result is committed without validation and becomes the baseline.
    pub fn with_options(attrs: Value, options: ModelOptions) -> Self {
        let mut attributes = options.defaults.unwrap_or_default();
        if let Value::Object(doc) = attrs {
            for (key, value) in doc {
                attributes.insert(key, value);
            }
        }

        let id_attribute = options
            .id_attribute
            .unwrap_or_else(|| DEFAULT_ID_ATTRIBUTE.to_string());
        let id = attributes
            .get(&id_attribute)
            .filter(|v| !v.is_null())
            .cloned();

        Self {
            cid: format!("c{}", NEXT_CID.fetch_add(1, Ordering::Relaxed)),
            id_attribute,
            url_root: options.url_root,
            url: options.url,
            validate: options.validate,
            parse: options.parse,
            bridge: options.bridge,
            state: Mutex::new(ModelState {
                id,
                previous: attributes.clone(),
                attributes,
                ..ModelState::default()
            }),
            events: Events::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Apply `update` as one mutation cycle: validate, diff, commit, then
    /// broadcast unless `options.silent`.
    ///
    /// Returns `Ok(false)` when the update is empty (nothing to do) and
    /// `Err(ModelError::Validation)` when the validate hook rejects the
    /// proposed document, in which case nothing is mutated.
    pub fn set(&self, update: impl Into<Update>, options: SetOptions) -> Result<bool> {
        let entries = update.into().into_entries(options.unset);
        if entries.is_empty() {
            return Ok(false);
        }

        let changes = loop {
            let (proposed, version) = {
                let st = self.state.lock();
                let proposed = self
                    .validate
                    .is_some()
                    .then(|| apply_entries(&st.attributes, &entries));
                (proposed, st.version)
            };
            if let (Some(validate), Some(proposed)) = (&self.validate, &proposed) {
                validate(proposed)?;
            }

            let mut st = self.state.lock();
            if proposed.is_none() || st.version == version {
                break self.apply(&mut st, entries, options);
            }
            tracing::trace!(cid = %self.cid, "document moved during validation, revalidating");
        };

        if !options.silent {
            self.broadcast(changes, options);
        }
        Ok(true)
    }

    /// Remove `attr`. Same contract as [`Model::set`].
    pub fn unset(&self, attr: &str, options: SetOptions) -> Result<bool> {
        self.set(
            Update::Pair(attr.to_string(), Value::Null),
            SetOptions {
                unset: true,
                ..options
            },
        )
    }

    /// Remove every attribute. `options.silent` is honored.
    pub fn clear(&self, options: SetOptions) -> Result<bool> {
        let keys: Attributes = self
            .state
            .lock()
            .attributes
            .keys()
            .map(|key| (key.clone(), Value::Null))
            .collect();
        self.set(
            Update::Document(keys),
            SetOptions {
                unset: true,
                ..options
            },
        )
    }

    /// Diff and commit `entries`; returns the keys to announce.
    fn apply(
        &self,
        st: &mut ModelState,
        entries: Vec<Entry>,
        options: SetOptions,
    ) -> IndexSet<String> {
        let outer = st.phase;
        st.phase = Phase::Mutating;
        st.version += 1;

        if let Some((_, value)) = entries.iter().find(|(key, _)| *key == self.id_attribute) {
            st.id = value.clone().filter(|v| !v.is_null());
        }

        let mut changes = IndexSet::new();
        for (key, value) in entries {
            if st.attributes.get(&key) != value.as_ref() {
                st.escaped.remove(&key);
                if !options.silent {
                    changes.insert(key.clone());
                }
            }

            match &value {
                Some(v) => {
                    st.attributes.insert(key.clone(), v.clone());
                }
                None => {
                    st.attributes.shift_remove(&key);
                }
            }

            if st.previous.get(&key) != value.as_ref() {
                st.changed
                    .insert(key.clone(), value.unwrap_or(Value::Null));
                if options.silent {
                    st.silent.insert(key);
                } else {
                    st.silent.shift_remove(&key);
                    st.pending.insert(key);
                }
            } else {
                st.changed.shift_remove(&key);
                st.pending.shift_remove(&key);
                st.silent.shift_remove(&key);
            }
        }

        st.phase = outer;
        changes
    }

    /// Announce `changes` and pending keys, then the aggregate `"change"`.
    fn broadcast(&self, changes: IndexSet<String>, options: SetOptions) {
        {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            st.queued.extend(changes);
            st.queued.extend(st.pending.iter().cloned());
            if st.phase == Phase::Broadcasting {
                tracing::debug!(cid = %self.cid, "coalescing nested change into active broadcast");
                return;
            }
            st.phase = Phase::Broadcasting;
        }

        let _reset = BroadcastReset(&self.state);
        let mut announced_any = false;
        loop {
            let mut announced = false;
            while let Some(batch) = self.take_queued() {
                for (attr, value) in batch {
                    let name = change_event(&attr);
                    let event = ModelEvent::AttributeChanged {
                        attr,
                        value,
                        options,
                    };
                    self.events.trigger(&name, self, &event);
                }
                announced = true;
            }
            if !announced {
                break;
            }
            announced_any = true;
            self.events
                .trigger(CHANGE, self, &ModelEvent::Changed { options });
        }

        if announced_any {
            self.refresh_baseline();
        }
    }

    fn take_queued(&self) -> Option<Vec<(String, Option<Value>)>> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if st.queued.is_empty() {
            return None;
        }
        let batch = st
            .queued
            .drain(..)
            .map(|key| {
                st.pending.shift_remove(&key);
                let value = st.attributes.get(&key).cloned();
                (key, value)
            })
            .collect();
        Some(batch)
    }

    /// Make the announced document the new baseline. Silently written keys
    /// keep their old baseline entry and stay in `changed`.
    fn refresh_baseline(&self) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let mut baseline = st.attributes.clone();
        for key in &st.silent {
            match st.previous.get(key) {
                Some(value) => {
                    baseline.insert(key.clone(), value.clone());
                }
                None => {
                    baseline.shift_remove(key);
                }
            }
        }
        st.previous = baseline;
        st.changed.retain(|key, _| st.silent.contains(key));
    }

    // -----------------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------------

    /// Run the validate hook against `proposed` without committing anything.
    pub fn validate_attributes(&self, proposed: &Attributes) -> Result<(), ValidationError> {
        match &self.validate {
            Some(validate) => validate(proposed),
            None => Ok(()),
        }
    }

    /// Whether the current document passes the validate hook.
    pub fn is_valid(&self) -> bool {
        self.validate_attributes(&self.attributes()).is_ok()
    }

    pub(crate) fn parse_response(&self, body: Value, meta: &ResponseMeta) -> Value {
        match &self.parse {
            Some(parse) => parse(body, meta),
            None => body,
        }
    }

    pub(crate) fn bridge(&self) -> Option<&Arc<dyn SyncBridge>> {
        self.bridge.as_ref()
    }

    // -----------------------------------------------------------------------
    // Readers
    // -----------------------------------------------------------------------

    pub fn get(&self, attr: &str) -> Option<Value> {
        self.state.lock().attributes.get(attr).cloned()
    }

    /// `true` when `attr` is present and not `null`.
    pub fn has(&self, attr: &str) -> bool {
        self.state
            .lock()
            .attributes
            .get(attr)
            .is_some_and(|v| !v.is_null())
    }

    /// HTML-escaped string form of `attr`, memoized until `attr` changes.
    pub fn escape(&self, attr: &str) -> String {
        let mut st = self.state.lock();
        if let Some(cached) = st.escaped.get(attr) {
            return cached.clone();
        }
        let escaped = escape_html(&display_value(st.attributes.get(attr)));
        st.escaped.insert(attr.to_string(), escaped.clone());
        escaped
    }

    /// Shallow copy of the current document.
    pub fn attributes(&self) -> Attributes {
        self.state.lock().attributes.clone()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    pub fn id(&self) -> Option<Value> {
        self.state.lock().id.clone()
    }

    /// Client-side identifier, unique within the process.
    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    /// `true` until the model has been assigned an id.
    pub fn is_new(&self) -> bool {
        self.state.lock().id.is_none()
    }

    /// Attributes diverging from the baseline, with their new values.
    pub fn changed(&self) -> Attributes {
        self.state.lock().changed.clone()
    }

    /// Whether `attr` (or, with `None`, any attribute) diverges from the baseline.
    pub fn has_changed(&self, attr: Option<&str>) -> bool {
        let st = self.state.lock();
        match attr {
            Some(attr) => st.changed.contains_key(attr),
            None => !st.changed.is_empty(),
        }
    }

    /// Without `diff`: the changed attributes, or `None` when nothing changed.
    /// With `diff`: the entries of `diff` that differ from the baseline.
    pub fn changed_attributes(&self, diff: Option<&Attributes>) -> Option<Attributes> {
        let st = self.state.lock();
        let out: Attributes = match diff {
            None => st.changed.clone(),
            Some(diff) => diff
                .iter()
                .filter(|(key, value)| st.previous.get(key.as_str()) != Some(*value))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };
        (!out.is_empty()).then_some(out)
    }

    /// Baseline value of `attr`.
    pub fn previous(&self, attr: &str) -> Option<Value> {
        self.state.lock().previous.get(attr).cloned()
    }

    pub fn previous_attributes(&self) -> Attributes {
        self.state.lock().previous.clone()
    }

    /// Keys changed but not yet announced.
    pub fn pending(&self) -> Vec<String> {
        self.state.lock().pending.iter().cloned().collect()
    }

    /// Keys written silently that have not been announced or reverted.
    pub fn silenced(&self) -> Vec<String> {
        self.state.lock().silent.iter().cloned().collect()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Endpoint for this model: the configured `url`, or `url_root` followed
    /// by the percent-encoded id once the model has one.
    pub fn url(&self) -> Option<String> {
        self.url_for(self.id().as_ref())
    }

    /// Endpoint this model would have with identifier `id`.
    pub(crate) fn url_for(&self, id: Option<&Value>) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        let root = self.url_root.as_deref()?.trim_end_matches('/');
        match id.filter(|v| !v.is_null()) {
            None => Some(root.to_string()),
            Some(id) => {
                let id = display_value(Some(id));
                Some(format!("{root}/{}", urlencoding::encode(&id)))
            }
        }
    }

    /// A new model with the same configuration and attributes, a fresh cid,
    /// and no listeners.
    pub fn duplicate(&self) -> Model {
        let options = ModelOptions {
            id_attribute: Some(self.id_attribute.clone()),
            url_root: self.url_root.clone(),
            url: self.url.clone(),
            defaults: None,
            validate: self.validate.clone(),
            parse: self.parse.clone(),
            bridge: self.bridge.clone(),
        };
        Model::with_options(self.to_json(), options)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// The model's dispatcher.
    pub fn events(&self) -> &Events<Model, ModelEvent> {
        &self.events
    }

    pub fn on(
        &self,
        event: &str,
        callback: impl Fn(&Model, &ModelEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events.on(event, callback)
    }

    pub fn off(&self, event: &str, callback: Option<&Arc<ModelCallback>>) {
        self.events.off(event, callback);
    }

    /// Trigger `event` on this model's dispatcher.
    pub fn trigger(&self, event: &str, payload: &ModelEvent) {
        self.events.trigger(event, self, payload);
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("Model")
            .field("cid", &self.cid)
            .field("id", &st.id)
            .field("attributes", &st.attributes)
            .field("changed", &st.changed)
            .field("phase", &st.phase)
            .finish()
    }
}

/// Returns the model to `Idle` when a broadcast pass ends, including by a
/// panicking listener.
struct BroadcastReset<'a>(&'a Mutex<ModelState>);

impl Drop for BroadcastReset<'_> {
    fn drop(&mut self) {
        let mut st = self.0.lock();
        st.queued.clear();
        st.pending.clear();
        st.phase = Phase::Idle;
    }
}
