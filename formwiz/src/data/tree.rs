use serde::Serialize;

use crate::data::field::{FieldId, FieldType, FieldValue};

/// The compiled, ordered fields of one wizard step.
///
/// Built by [`crate::compile::compile_step`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldTree {
    /// Step the tree was compiled for.
    pub step: u32,
    /// Top-level fields sorted by `order`.
    pub fields: Vec<FieldNode>,
}

impl FieldTree {
    /// Looks up a top-level field by name.
    pub fn find(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterates over the top-level fields in order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldNode> {
        self.fields.iter()
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the tree has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A compiled field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldNode {
    /// Identity from the schema source.
    pub id: Option<FieldId>,
    /// Field name.
    pub name: String,
    /// Key under which the rendering target reports the field's value.
    ///
    /// Equal to `name` for top-level fields and template fields, and the
    /// composite `parent__name__order` key inside an addon group. `parent`
    /// is the key of the enclosing addon, itself composite when that addon
    /// sits in another addon's group.
    pub key: String,
    /// Sort key the field was ordered by.
    pub order: i64,
    /// Input type.
    pub field_type: FieldType,
    /// Whether the field is required.
    pub required: bool,
    /// Label text.
    pub label: Option<String>,
    /// Placeholder hint.
    pub placeholder: Option<String>,
    /// Choices for select, radio and checkbox fields.
    pub options: Vec<String>,
    /// Minimum number of checked options or addon groups.
    pub minimum_required: Option<u32>,
    /// Simple or addon specific content.
    pub kind: FieldKind,
}

impl FieldNode {
    /// Whether this is an addon field.
    pub fn is_addon(&self) -> bool {
        matches!(self.kind, FieldKind::Addon { .. })
    }

    /// Whether the field captures a list of checked options.
    pub fn is_multi_choice(&self) -> bool {
        self.field_type == FieldType::Checkbox && self.options.len() > 1
    }

    /// Initial value of a simple field.
    pub fn initial(&self) -> Option<&FieldValue> {
        match &self.kind {
            FieldKind::Simple { initial } => initial.as_ref(),
            FieldKind::Addon { .. } => None,
        }
    }

    /// Compiled sub-schema of an addon field.
    pub fn template(&self) -> &[FieldNode] {
        match &self.kind {
            FieldKind::Addon { template, .. } => template,
            FieldKind::Simple { .. } => &[],
        }
    }

    /// Expanded groups of an addon field.
    pub fn groups(&self) -> &[GroupTree] {
        match &self.kind {
            FieldKind::Addon { groups, .. } => groups,
            FieldKind::Simple { .. } => &[],
        }
    }

    /// Value the field holds when nothing has been captured for it.
    pub fn empty_value(&self) -> FieldValue {
        if self.is_addon() {
            FieldValue::Groups(Vec::new())
        } else if self.is_multi_choice() {
            FieldValue::Many(Vec::new())
        } else {
            FieldValue::Text(String::new())
        }
    }
}

/// Content that differs between simple and addon fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    /// A field holding a scalar or a list of checked options.
    Simple {
        /// Initial value from the schema source or the enclosing group.
        initial: Option<FieldValue>,
    },
    /// A list of repeated sub-field groups.
    Addon {
        /// The sub-schema compiled without values, for adding new groups.
        template: Vec<FieldNode>,
        /// One sub-field tree per existing group instance.
        groups: Vec<GroupTree>,
    },
}

/// The compiled sub-fields of one addon group instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTree {
    /// Name of the addon the group belongs to.
    pub parent: String,
    /// Group order.
    pub order: u32,
    /// Sub-fields sorted by `order`.
    pub fields: Vec<FieldNode>,
}
