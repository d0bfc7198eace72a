//! Reshaping of captured values into a submission record.
//!
//! The capture format is flat: top-level fields report under their own name
//! and addon sub-fields under the composite `parent__child__order` key. The
//! composite keys are parsed at this boundary and folded back into one list
//! of [`AddOnGroup`]s per addon field.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    data::{
        capture::{CaptureKey, CapturedValues, group_key},
        field::{AddOnGroup, FieldId, FieldValue, GroupField},
        tree::{FieldNode, FieldTree},
    },
    error::AggregateError,
};

/// The reshaped value of one top-level field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    pub id: Option<FieldId>,
    pub name: String,
    pub value: FieldValue,
}

/// The submission payload of one step.
///
/// Holds exactly one record per top-level field of the step's tree, in tree
/// order. Serializes as a JSON array of `{id, name, value}` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StructuredRecord(Vec<FieldRecord>);

impl StructuredRecord {
    /// Value of the field named `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|r| r.name == name).map(|r| &r.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The JSON body posted to the submission endpoint.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|r| {
                    let id = match &r.id {
                        Some(FieldId::Number(n)) => json!(n),
                        Some(FieldId::Text(s)) => json!(s),
                        None => Value::Null,
                    };
                    json!({ "id": id, "name": r.name, "value": Value::from(&r.value) })
                })
                .collect(),
        )
    }
}

/// Sub-fields collected for one addon, keyed by group order.
type GroupBucket = BTreeMap<u32, Vec<GroupField>>;

/// Addon content collected from the capture, by addon capture key.
#[derive(Default)]
struct Collected {
    /// Sub-fields reported under composite keys.
    groups: HashMap<String, GroupBucket>,
    /// Group lists reported under the addon's own key.
    direct: HashMap<String, Vec<AddOnGroup>>,
}

/// Reshapes the captured values of a step into a [`StructuredRecord`].
///
/// Fields without a captured value are reported with their empty value.
/// Addons nested in addon groups come out as group lists inside the
/// enclosing group, whether they were captured as one list or under
/// composite sub-field keys.
///
/// # Errors
///
/// Any captured key that cannot be resolved against `tree` is a contract
/// violation between the engine and the rendering target and fails the
/// whole reshape.
pub fn reshape(tree: &FieldTree, captured: &CapturedValues) -> Result<StructuredRecord, AggregateError> {
    let mut simple: HashMap<&str, &FieldValue> = HashMap::new();
    let mut collected = Collected::default();

    for (key, value) in captured.iter() {
        match CaptureKey::parse(key)? {
            CaptureKey::Field(name) => {
                let node = tree.find(name).ok_or_else(|| unknown(key))?;
                if node.is_addon() {
                    collected.add_list(node, key, value)?;
                } else {
                    simple.insert(name, value);
                }
            }
            CaptureKey::Group {
                parent,
                child,
                order,
            } => {
                let addon = find_addon(tree, key, parent)?;
                let node = addon
                    .template()
                    .iter()
                    .find(|t| t.name == child)
                    .ok_or_else(|| unknown(key))?;
                collected.touch(parent, order);
                if node.is_addon() {
                    collected.add_list(node, key, value)?;
                } else {
                    collected
                        .groups
                        .entry(parent.to_string())
                        .or_default()
                        .entry(order)
                        .or_default()
                        .push(GroupField {
                            name: child.to_string(),
                            value: value.clone(),
                        });
                }
            }
        }
    }

    let mut records = Vec::with_capacity(tree.len());
    for node in tree.iter() {
        let value = if node.is_addon() {
            FieldValue::Groups(collected.assemble(node, &node.key, &[])?)
        } else {
            simple
                .get(node.name.as_str())
                .map(|v| (*v).clone())
                .unwrap_or_else(|| node.empty_value())
        };
        records.push(FieldRecord {
            id: node.id.clone(),
            name: node.name.clone(),
            value,
        });
    }

    debug!("Reshaped step {} into {} record(s)", tree.step, records.len());
    Ok(StructuredRecord(records))
}

fn unknown(key: &str) -> AggregateError {
    AggregateError::UnknownField {
        key: key.to_string(),
    }
}

/// Resolves the addon field addressed by the parent part of a composite key.
fn find_addon<'t>(tree: &'t FieldTree, key: &str, parent: &str) -> Result<&'t FieldNode, AggregateError> {
    let node = match CaptureKey::parse(parent)? {
        CaptureKey::Field(name) => tree.find(name),
        CaptureKey::Group {
            parent: outer,
            child,
            ..
        } => find_addon(tree, key, outer)?
            .template()
            .iter()
            .find(|t| t.name == child),
    }
    .ok_or_else(|| unknown(key))?;

    if !node.is_addon() {
        return Err(AggregateError::NotAnAddon {
            key: key.to_string(),
            parent: parent.to_string(),
        });
    }
    Ok(node)
}

/// Reads a value captured for an addon as a group list.
///
/// An empty option list is what an empty JSON list decodes to, so it counts
/// as no groups.
fn as_groups<'v>(node: &FieldNode, value: &'v FieldValue) -> Result<&'v [AddOnGroup], AggregateError> {
    match value {
        FieldValue::Groups(list) => Ok(list.as_slice()),
        FieldValue::Many(values) if values.is_empty() => Ok(&[]),
        _ => Err(AggregateError::ShapeMismatch {
            name: node.name.clone(),
        }),
    }
}

impl Collected {
    fn add_list(&mut self, node: &FieldNode, key: &str, value: &FieldValue) -> Result<(), AggregateError> {
        let list = as_groups(node, value)?;
        self.direct.insert(key.to_string(), list.to_vec());
        Ok(())
    }

    /// Makes sure the group `order` of the addon keyed `parent` exists, and
    /// every group enclosing it.
    fn touch(&mut self, parent: &str, order: u32) {
        self.groups
            .entry(parent.to_string())
            .or_default()
            .entry(order)
            .or_default();
        if let Ok(CaptureKey::Group {
            parent: outer,
            order: outer_order,
            ..
        }) = CaptureKey::parse(parent)
        {
            self.touch(outer, outer_order);
        }
    }

    /// Builds the group list of the addon `node` captured under `key`.
    ///
    /// Composite keys win over a group list under `key`, which wins over
    /// `inherited`, the list found in an enclosing group. Groups are unique
    /// by order and sorted by it; sub-fields follow the template order.
    fn assemble(
        &mut self,
        node: &FieldNode,
        key: &str,
        inherited: &[AddOnGroup],
    ) -> Result<Vec<AddOnGroup>, AggregateError> {
        let mut bucket = self.groups.remove(key).unwrap_or_default();
        let direct = self.direct.remove(key).unwrap_or_default();
        for group in direct.iter().chain(inherited) {
            let fields = bucket.entry(group.order).or_default();
            for field in &group.fields {
                if !fields.iter().any(|f| f.name == field.name) {
                    fields.push(field.clone());
                }
            }
        }

        let position = |name: &str| {
            node.template()
                .iter()
                .position(|t| t.name == name)
                .unwrap_or(usize::MAX)
        };

        let mut groups = Vec::with_capacity(bucket.len());
        for (order, mut fields) in bucket {
            for child in node.template().iter().filter(|t| t.is_addon()) {
                let existing = fields.iter().position(|f| f.name == child.name);
                let outer = match existing {
                    Some(i) => as_groups(child, &fields[i].value)?.to_vec(),
                    None => Vec::new(),
                };
                let nested_key = group_key(key, &child.name, order);
                let reported =
                    self.direct.contains_key(&nested_key) || self.groups.contains_key(&nested_key);
                let nested = self.assemble(child, &nested_key, &outer)?;
                match existing {
                    Some(i) => fields[i].value = FieldValue::Groups(nested),
                    None if reported || !nested.is_empty() => fields.push(GroupField {
                        name: child.name.clone(),
                        value: FieldValue::Groups(nested),
                    }),
                    None => {}
                }
            }
            fields.sort_by_key(|f| position(&f.name));
            groups.push(AddOnGroup { order, fields });
        }
        Ok(groups)
    }
}
