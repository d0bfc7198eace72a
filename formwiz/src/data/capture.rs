use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{data::field::FieldValue, error::AggregateError};

/// Separator of the composite capture key format `parent__child__order`.
pub const GROUP_KEY_SEPARATOR: &str = "__";

/// Builds the composite capture key of an addon sub-field.
pub fn group_key(parent: &str, child: &str, order: u32) -> String {
    format!("{parent}{GROUP_KEY_SEPARATOR}{child}{GROUP_KEY_SEPARATOR}{order}")
}

/// A parsed capture key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKey<'a> {
    /// Key of a top-level field.
    Field(&'a str),
    /// Key of a sub-field inside an addon group.
    Group {
        /// Name of the addon field.
        parent: &'a str,
        /// Name of the sub-field within the addon sub-schema.
        child: &'a str,
        /// Order of the group the sub-field belongs to.
        order: u32,
    },
}

impl<'a> CaptureKey<'a> {
    /// Parses a raw capture key.
    ///
    /// Keys without the separator address top-level fields. Keys with it end
    /// in a non-empty child name and a numeric group order. The parent part is
    /// either a field name or, for addons nested in addon groups, a composite
    /// key itself.
    pub fn parse(key: &'a str) -> Result<Self, AggregateError> {
        if !key.contains(GROUP_KEY_SEPARATOR) {
            return Ok(CaptureKey::Field(key));
        }
        let malformed = || AggregateError::MalformedKey {
            key: key.to_string(),
        };

        let mut parts = key.rsplitn(3, GROUP_KEY_SEPARATOR);
        let (Some(order), Some(child), Some(parent)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if parent.is_empty() || child.is_empty() {
            return Err(malformed());
        }
        let order = order.parse::<u32>().map_err(|_| malformed())?;
        if parent.contains(GROUP_KEY_SEPARATOR) && CaptureKey::parse(parent).is_err() {
            return Err(malformed());
        }

        Ok(CaptureKey::Group {
            parent,
            child,
            order,
        })
    }

    /// Name of the top-level field the key belongs to.
    pub fn base_name(&self) -> &'a str {
        match *self {
            CaptureKey::Field(name) => name,
            CaptureKey::Group { parent, .. } => parent
                .split(GROUP_KEY_SEPARATOR)
                .next()
                .unwrap_or(parent),
        }
    }
}

/// Values captured by a rendering target, keyed by capture key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapturedValues(BTreeMap<String, FieldValue>);

impl CapturedValues {
    /// Creates an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of a key, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a key.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    /// Keeps only the keys for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &FieldValue) -> bool) {
        self.0.retain(|k, v| keep(k, v));
    }

    /// Value of a key.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Iterates over keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of captured keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value addressed by `key`.
    ///
    /// Falls back to the group lists captured for enclosing addons when the
    /// key itself was not captured.
    pub fn resolve(&self, key: &str) -> Option<&FieldValue> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }
        let Ok(CaptureKey::Group {
            parent,
            child,
            order,
        }) = CaptureKey::parse(key)
        else {
            return None;
        };
        match self.resolve(parent)? {
            FieldValue::Groups(groups) => groups.iter().find(|g| g.order == order)?.get(child),
            _ => None,
        }
    }

    /// Distinct group orders captured for the addon with capture key `parent`.
    ///
    /// Counts composite keys below the addon, at any depth, and group lists
    /// resolved for the addon's own key. Malformed keys are skipped.
    pub fn group_orders(&self, parent: &str) -> BTreeSet<u32> {
        let mut orders = BTreeSet::new();
        if let Some(FieldValue::Groups(groups)) = self.resolve(parent) {
            orders.extend(groups.iter().map(|g| g.order));
        }
        for key in self.0.keys() {
            let mut current = key.as_str();
            while let Ok(CaptureKey::Group { parent: p, order, .. }) = CaptureKey::parse(current) {
                if p == parent {
                    orders.insert(order);
                    break;
                }
                current = p;
            }
        }
        orders
    }
}

impl<K, V> FromIterator<(K, V)> for CapturedValues
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
