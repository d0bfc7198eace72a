use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line text input.
    Text,
    /// Email address input.
    Email,
    /// Password input.
    Password,
    /// Numeric input.
    Number,
    /// Drop-down selection from `options`.
    Select,
    /// Exactly one choice out of `options`.
    Radio,
    /// Zero or more choices out of `options`.
    Checkbox,
    /// Multi-line text input.
    Textarea,
    /// User-extensible list of repeated sub-field groups.
    Addon,
}

impl FieldType {
    /// Name of the type as used in the schema source.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Textarea => "textarea",
            FieldType::Addon => "addon",
        }
    }

    /// Whether fields of this type choose from a list of options.
    pub fn needs_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio | FieldType::Checkbox)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a field as assigned by the schema source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldId {
    /// Numeric identifier.
    Number(i64),
    /// Textual identifier.
    Text(String),
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::Number(n) => write!(f, "{n}"),
            FieldId::Text(s) => f.write_str(s),
        }
    }
}

/// One field definition of the schema source.
///
/// Keys are optional at this level so that integrity problems can be
/// reported with the offending index instead of failing the whole parse.
/// [`crate::compile::compile_step`] enforces `order`, `name` and `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Identity echoed back in submitted records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FieldId>,
    /// Wizard step the field belongs to. Unused inside addon sub-schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    /// Sort key within a step or an addon group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Unique name within the step or group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Input type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    /// Whether the field must be completed before submitting.
    #[serde(default)]
    pub required: bool,
    /// Label shown next to the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Placeholder hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Initial value; a list of [`AddOnGroup`] for addon fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Choices for select, radio and checkbox fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Minimum number of checked options or addon groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_required: Option<u32>,
    /// Sub-field definitions of an addon group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<FieldSchema>>,
}

impl FieldSchema {
    /// Creates a field definition carrying the keys every entry needs.
    pub fn new(step: u32, order: i64, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            step: Some(step),
            order: Some(order),
            name: Some(name.into()),
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    /// Creates a sub-field definition for an addon sub-schema.
    pub fn sub_field(order: i64, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            order: Some(order),
            name: Some(name.into()),
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the field identity.
    pub fn with_id(mut self, id: FieldId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the choices of a select, radio or checkbox field.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the minimum number of checked options or addon groups.
    pub fn with_minimum(mut self, minimum: u32) -> Self {
        self.minimum_required = Some(minimum);
        self
    }

    /// Sets the sub-schema of an addon field.
    pub fn with_sub_schema(mut self, schema: Vec<FieldSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets the initial value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// One named value inside an [`AddOnGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GroupField {
    /// Sub-field name as defined by the addon sub-schema.
    pub name: String,
    /// Captured value of the sub-field.
    pub value: FieldValue,
}

/// One repeating instance of an addon's sub-schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AddOnGroup {
    /// Position of the group within its addon.
    pub order: u32,
    /// Sub-field values of the group.
    pub fields: Vec<GroupField>,
}

impl AddOnGroup {
    /// Looks up a sub-field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

/// Value held by a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scalar value of inputs, selects, radios and single checkboxes.
    Text(String),
    /// Checked options of a multi-option checkbox.
    Many(Vec<String>),
    /// Groups of an addon field.
    Groups(Vec<AddOnGroup>),
}

impl FieldValue {
    /// Converts a JSON value from the schema source.
    ///
    /// Returns `None` for `null` and for shapes no field can hold.
    pub fn from_json(value: &Value) -> Option<FieldValue> {
        match value {
            Value::Null | Value::Object(_) => None,
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            Value::Array(items) => {
                if items.iter().all(|v| !v.is_object() && !v.is_array()) {
                    let values = items
                        .iter()
                        .filter_map(|v| match v {
                            Value::String(s) => Some(s.clone()),
                            Value::Null => None,
                            other => Some(other.to_string()),
                        })
                        .collect();
                    Some(FieldValue::Many(values))
                } else {
                    serde_json::from_value(value.clone())
                        .ok()
                        .map(FieldValue::Groups)
                }
            }
        }
    }

    /// Whether the value counts as not filled in.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Many(v) => v.is_empty(),
            FieldValue::Groups(g) => g.is_empty(),
        }
    }

    /// Number of selected options, or of groups for addon values.
    pub fn selected_count(&self) -> usize {
        match self {
            FieldValue::Text(s) => usize::from(!s.is_empty()),
            FieldValue::Many(v) => v.len(),
            FieldValue::Groups(g) => g.len(),
        }
    }

    /// The scalar text, if this is a scalar value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Many(v) => Value::Array(v.iter().cloned().map(Value::String).collect()),
            FieldValue::Groups(groups) => Value::Array(
                groups
                    .iter()
                    .map(|g| {
                        let fields = g
                            .fields
                            .iter()
                            .map(|f| serde_json::json!({ "name": f.name, "value": Value::from(&f.value) }))
                            .collect::<Vec<_>>();
                        serde_json::json!({ "order": g.order, "fields": fields })
                    })
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_field_schema() {
        let field: FieldSchema = serde_json::from_value(json!({
            "id": 7,
            "step": 2,
            "order": 1,
            "name": "colors",
            "type": "checkbox",
            "required": true,
            "options": ["red", "green"],
            "minimumRequired": 2
        }))
        .unwrap();

        assert_eq!(field.id, Some(FieldId::Number(7)));
        assert_eq!(field.step, Some(2));
        assert_eq!(field.field_type, Some(FieldType::Checkbox));
        assert_eq!(field.minimum_required, Some(2));
        assert_eq!(field.options, vec!["red", "green"]);
        assert!(field.schema.is_none());
    }

    #[test]
    fn test_missing_keys_are_kept_as_none() {
        let field: FieldSchema = serde_json::from_value(json!({"step": 1, "order": 3})).unwrap();
        assert!(field.name.is_none());
        assert!(field.field_type.is_none());
        assert!(!field.required);
    }

    #[test]
    fn test_field_value_from_json() {
        assert_eq!(FieldValue::from_json(&json!(null)), None);
        assert_eq!(FieldValue::from_json(&json!("a")), Some("a".into()));
        assert_eq!(FieldValue::from_json(&json!(42)), Some("42".into()));
        assert_eq!(
            FieldValue::from_json(&json!(["a", "b"])),
            Some(FieldValue::Many(vec!["a".into(), "b".into()]))
        );

        let groups = FieldValue::from_json(&json!([
            {"order": 0, "fields": [{"name": "name", "value": "A"}]}
        ]))
        .unwrap();
        let FieldValue::Groups(groups) = groups else {
            panic!("expected groups");
        };
        assert_eq!(groups[0].get("name"), Some(&FieldValue::from("A")));
    }

    #[test]
    fn test_selected_count() {
        assert_eq!(FieldValue::from("").selected_count(), 0);
        assert_eq!(FieldValue::from("yes").selected_count(), 1);
        assert_eq!(
            FieldValue::Many(vec!["a".into(), "b".into()]).selected_count(),
            2
        );
    }

    #[test]
    fn test_groups_to_json() {
        let value = FieldValue::Groups(vec![AddOnGroup {
            order: 1,
            fields: vec![GroupField {
                name: "phone".into(),
                value: "555".into(),
            }],
        }]);
        assert_eq!(
            Value::from(&value),
            json!([{"order": 1, "fields": [{"name": "phone", "value": "555"}]}])
        );
    }
}
