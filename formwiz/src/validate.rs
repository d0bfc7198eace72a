//! Required-field validation.
//!
//! [`check_completeness`] is a pure function over a field tree and a
//! snapshot of captured values. [`ErrorBoard`] tracks which errors are
//! currently displayed so that repeated attempts never show an error twice
//! and a changed field loses its error immediately.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::{
    capture::{CaptureKey, CapturedValues, group_key},
    field::{FieldId, FieldType},
    tree::{FieldNode, FieldTree},
};

/// Message for empty inputs, selects and textareas.
pub const FILL_MESSAGE: &str = "This field must be filled.";

/// Message for radio groups without a selection.
pub const SELECT_MESSAGE: &str = "1 option must be selected.";

/// Identifies the field-tree node an error belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    /// Identity from the schema source.
    pub id: Option<FieldId>,
    /// Field name.
    pub name: String,
    /// Capture key of the field.
    pub key: String,
}

impl FieldRef {
    fn of(node: &FieldNode, key: &str) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            key: key.to_string(),
        }
    }
}

/// A required field that is not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The offending field.
    pub field: FieldRef,
    /// Message to show next to the field.
    pub message: String,
}

/// Outcome of [`check_completeness`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    /// Whether the step may be submitted.
    pub ok: bool,
    /// One error per incomplete field.
    pub errors: Vec<ValidationError>,
}

/// Checks every required field of a step against the captured values.
///
/// Only fields marked `required` are checked, plus checkbox and addon
/// fields carrying a `minimumRequired` threshold. Sub-fields of captured
/// addon groups are checked as well, at any nesting depth, keyed by their
/// composite key. Values are looked up by key first and then in the group
/// lists captured for enclosing addons.
pub fn check_completeness(tree: &FieldTree, captured: &CapturedValues) -> CompletenessReport {
    let mut errors = Vec::new();
    for node in tree.iter() {
        check_node(node, &node.key, captured, &mut errors);
        check_groups(node, &node.key, captured, &mut errors);
    }

    CompletenessReport {
        ok: errors.is_empty(),
        errors,
    }
}

/// Minimum count a checkbox or addon field must reach, if it is gated.
///
/// A threshold applies whenever `minimumRequired` is set; a required field
/// without one defaults to 1.
pub fn required_threshold(node: &FieldNode) -> Option<u32> {
    match (node.minimum_required, node.required) {
        (Some(minimum), _) => Some(minimum),
        (None, true) => Some(1),
        (None, false) => None,
    }
}

fn check_groups(node: &FieldNode, key: &str, captured: &CapturedValues, errors: &mut Vec<ValidationError>) {
    if !node.is_addon() {
        return;
    }
    for order in captured.group_orders(key) {
        for child in node.template() {
            let child_key = group_key(key, &child.name, order);
            check_node(child, &child_key, captured, errors);
            check_groups(child, &child_key, captured, errors);
        }
    }
}

fn check_node(node: &FieldNode, key: &str, captured: &CapturedValues, errors: &mut Vec<ValidationError>) {
    let value = captured.resolve(key);

    let message = match node.field_type {
        FieldType::Checkbox => {
            let Some(minimum) = required_threshold(node) else {
                return;
            };
            let count = value.map_or(0, |v| v.selected_count());
            (count < minimum as usize)
                .then(|| format!("{minimum} option(s) must be checked at a minimum."))
        }
        FieldType::Addon => {
            let Some(minimum) = required_threshold(node) else {
                return;
            };
            let count = captured.group_orders(key).len();
            (count < minimum as usize).then(|| format!("{minimum} item(s) must be set at a minimum."))
        }
        FieldType::Radio => {
            (node.required && value.is_none_or(|v| v.is_empty())).then(|| SELECT_MESSAGE.to_string())
        }
        FieldType::Text
        | FieldType::Email
        | FieldType::Password
        | FieldType::Number
        | FieldType::Select
        | FieldType::Textarea => {
            (node.required && value.is_none_or(|v| v.is_empty())).then(|| FILL_MESSAGE.to_string())
        }
    };

    if let Some(message) = message {
        errors.push(ValidationError {
            field: FieldRef::of(node, key),
            message,
        });
    }
}

/// Changes to the displayed errors after a validation attempt.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BoardUpdate {
    /// Errors that were not displayed before.
    pub shown: Vec<ValidationError>,
    /// Displayed errors that no longer apply.
    pub cleared: Vec<ValidationError>,
}

/// The validation errors currently displayed for one rendered step.
#[derive(Debug, Default)]
pub struct ErrorBoard {
    active: BTreeMap<String, ValidationError>,
}

impl ErrorBoard {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the displayed errors with those of a new report.
    ///
    /// Errors already displayed with the same message are not shown again.
    pub fn post(&mut self, report: &CompletenessReport) -> BoardUpdate {
        let mut update = BoardUpdate::default();
        let mut next = BTreeMap::new();

        for error in &report.errors {
            match self.active.remove(&error.field.key) {
                Some(previous) if previous.message == error.message => {}
                Some(previous) => {
                    update.cleared.push(previous);
                    update.shown.push(error.clone());
                }
                None => update.shown.push(error.clone()),
            }
            next.insert(error.field.key.clone(), error.clone());
        }
        update.cleared.extend(std::mem::take(&mut self.active).into_values());
        self.active = next;
        update
    }

    /// Clears the errors affected by a change of the field with `key`.
    ///
    /// A change of an addon sub-field also clears the errors of the
    /// enclosing addons.
    pub fn clear_for(&mut self, key: &str) -> Vec<ValidationError> {
        let mut cleared = Vec::new();
        cleared.extend(self.active.remove(key));
        let mut current = key;
        while let Ok(CaptureKey::Group { parent, .. }) = CaptureKey::parse(current) {
            cleared.extend(self.active.remove(parent));
            current = parent;
        }
        cleared
    }

    /// Currently displayed errors.
    pub fn active(&self) -> impl Iterator<Item = &ValidationError> {
        self.active.values()
    }

    /// Whether no error is displayed.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
