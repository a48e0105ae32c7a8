//! Attribute documents and the argument shapes accepted by `set`/`save`.

use serde_json::{Map, Value};

/// A flat key→value document. Iteration follows insertion order.
pub type Attributes = Map<String, Value>;

/// One normalized entry of an update: `None` marks the key for deletion.
pub(crate) type Entry = (String, Option<Value>);

/// The shapes an attribute update can take at the API boundary.
///
/// Everything is normalized into one canonical entry list before the
/// mutation algorithm runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Update {
    /// Nothing to write (`save` with no new attributes).
    #[default]
    Empty,
    /// A single `(key, value)` pair.
    Pair(String, Value),
    /// A whole document.
    Document(Attributes),
}

impl Update {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Pair(..) => false,
            Self::Document(doc) => doc.is_empty(),
        }
    }

    /// The update as a plain document.
    pub fn into_attributes(self) -> Attributes {
        match self {
            Self::Empty => Attributes::new(),
            Self::Pair(key, value) => {
                let mut doc = Attributes::new();
                doc.insert(key, value);
                doc
            }
            Self::Document(doc) => doc,
        }
    }

    /// Canonical entry list; `unset` turns every value into a deletion.
    pub(crate) fn into_entries(self, unset: bool) -> Vec<Entry> {
        self.into_attributes()
            .into_iter()
            .map(|(key, value)| (key, (!unset).then_some(value)))
            .collect()
    }
}

impl From<()> for Update {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<Attributes> for Update {
    fn from(doc: Attributes) -> Self {
        Self::Document(doc)
    }
}

/// Objects become documents; any other value (including `null`) is empty.
impl From<Value> for Update {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(doc) => Self::Document(doc),
            _ => Self::Empty,
        }
    }
}

impl<K, V> From<(K, V)> for Update
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from((key, value): (K, V)) -> Self {
        Self::Pair(key.into(), value.into())
    }
}

/// Shallow merge: entries of `top` replace those of `base`.
pub(crate) fn merged(base: &Attributes, top: &Attributes) -> Attributes {
    let mut out = base.clone();
    for (key, value) in top {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Apply normalized entries to a copy of `current`.
pub(crate) fn apply_entries(current: &Attributes, entries: &[Entry]) -> Attributes {
    let mut out = current.clone();
    for (key, value) in entries {
        match value {
            Some(value) => {
                out.insert(key.clone(), value.clone());
            }
            None => {
                out.shift_remove(key);
            }
        }
    }
    out
}
