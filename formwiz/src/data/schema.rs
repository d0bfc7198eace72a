use serde_json::Value;

use crate::data::field::{FieldSchema, FieldType};

/// Schema integrity errors.
///
/// Any of these is fatal to the step (or the whole run when raised while
/// loading) and is distinct from user-validation failures.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema source contained no fields.
    #[error("schema source is empty")]
    Empty,
    /// The schema source is not a JSON array of field definitions.
    #[error("failed to parse schema source: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field carries no `step`.
    #[error("field at index {index} has no step")]
    MissingStep { index: usize },
    /// A field lacks keys every entry must carry.
    #[error(
        "field at index {index} is missing required key(s): {}",
        missing.join(", ")
    )]
    MissingKeys {
        index: usize,
        missing: Vec<&'static str>,
    },
    /// The requested step has no fields.
    #[error("step {step} has no fields")]
    EmptyStep { step: u32 },
    /// Two fields of one step or group share a name.
    #[error("field name `{name}` is used more than once in step {step}")]
    DuplicateName { step: u32, name: String },
    /// A field name contains the composite key separator.
    #[error("field name `{name}` at index {index} contains the reserved separator `__`")]
    ReservedSeparator { index: usize, name: String },
    /// A choice field has no options.
    #[error("{field_type} field `{name}` at index {index} has no options")]
    MissingOptions {
        index: usize,
        name: String,
        field_type: FieldType,
    },
    /// An addon field has no sub-schema.
    #[error("addon field `{name}` at index {index} has no sub-schema")]
    MissingSubSchema { index: usize, name: String },
    /// The initial value cannot be held by the field's type.
    #[error("initial value of `{name}` is not valid for a {field_type} field")]
    InvalidInitialValue { name: String, field_type: FieldType },
    /// A problem inside an addon sub-schema.
    #[error("in addon `{parent}`: {source}")]
    Nested {
        parent: String,
        #[source]
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    /// Wraps an error raised inside the sub-schema of `parent`.
    pub fn nested(parent: &str, source: SchemaError) -> Self {
        SchemaError::Nested {
            parent: parent.to_string(),
            source: Box::new(source),
        }
    }
}

/// Parses the schema source document.
///
/// The document must be a non-empty array whose entries all carry a `step`.
/// The remaining keys are checked per step by the compiler.
pub fn parse_schema(document: Value) -> Result<Vec<FieldSchema>, SchemaError> {
    let schema: Vec<FieldSchema> = serde_json::from_value(document)?;
    if schema.is_empty() {
        return Err(SchemaError::Empty);
    }
    if let Some(index) = schema.iter().position(|f| f.step.is_none()) {
        return Err(SchemaError::MissingStep { index });
    }
    Ok(schema)
}

/// Number of steps spanned by a schema: the largest `step` value.
pub fn total_steps(schema: &[FieldSchema]) -> Result<u32, SchemaError> {
    let mut max: Option<u32> = None;
    for (index, field) in schema.iter().enumerate() {
        let step = field.step.ok_or(SchemaError::MissingStep { index })?;
        max = Some(max.map_or(step, |m| m.max(step)));
    }
    max.ok_or(SchemaError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_schema() {
        let schema = parse_schema(json!([
            {"step": 1, "order": 1, "name": "a", "type": "text"},
            {"step": 3, "order": 1, "name": "b", "type": "text"},
            {"step": 2, "order": 1, "name": "c", "type": "text"}
        ]))
        .unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(total_steps(&schema).unwrap(), 3);
    }

    #[test]
    fn test_parse_empty_schema() {
        assert!(matches!(parse_schema(json!([])), Err(SchemaError::Empty)));
        assert!(matches!(total_steps(&[]), Err(SchemaError::Empty)));
    }

    #[test]
    fn test_parse_schema_without_step() {
        let err = parse_schema(json!([
            {"step": 1, "order": 1, "name": "a", "type": "text"},
            {"order": 2, "name": "b", "type": "text"}
        ]))
        .unwrap_err();
        assert!(matches!(err, SchemaError::MissingStep { index: 1 }));
    }

    #[test]
    fn test_parse_schema_not_an_array() {
        assert!(matches!(
            parse_schema(json!({"step": 1})),
            Err(SchemaError::Parse(_))
        ));
    }

    #[test]
    fn test_nested_error_message() {
        let err = SchemaError::nested(
            "contacts",
            SchemaError::MissingKeys {
                index: 2,
                missing: vec!["name", "type"],
            },
        );
        assert_eq!(
            err.to_string(),
            "in addon `contacts`: field at index 2 is missing required key(s): name, type"
        );
    }
}
