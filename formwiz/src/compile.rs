//! Schema to field tree compiler.
//!
//! [`compile_step`] selects the fields of one step, checks their integrity,
//! orders them and expands addon fields into one sub-field tree per
//! existing group instance. Addons nested inside addon sub-schemas are
//! expanded recursively.

use std::collections::HashSet;

use crate::data::{
    capture::{GROUP_KEY_SEPARATOR, group_key},
    field::{AddOnGroup, FieldSchema, FieldType, FieldValue},
    schema::SchemaError,
    tree::{FieldKind, FieldNode, FieldTree, GroupTree},
};

/// A field definition that passed the integrity check.
struct Checked<'a> {
    index: usize,
    order: i64,
    name: &'a str,
    field_type: FieldType,
    field: &'a FieldSchema,
}

/// Where a field is being compiled.
enum Placement<'a> {
    TopLevel,
    Template,
    Group {
        /// Capture key of the enclosing addon.
        parent_key: &'a str,
        group: &'a AddOnGroup,
    },
}

/// Compiles the fields of `step` into an ordered field tree.
///
/// Fields are sorted by `order`; ties keep their relative order from the
/// schema. Every entry of the step (and of every addon sub-schema) must
/// carry `order`, `name` and `type`; a single failing entry aborts the whole
/// step.
///
/// # Errors
///
/// Returns a [`SchemaError`] when the step has no fields or any entry fails
/// the integrity check.
pub fn compile_step(schema: &[FieldSchema], step: u32) -> Result<FieldTree, SchemaError> {
    let entries = schema
        .iter()
        .enumerate()
        .filter(|(_, f)| f.step == Some(step))
        .collect::<Vec<_>>();

    let tree = compile_entries(&entries, step).map(|fields| FieldTree { step, fields });
    if let Err(e) = &tree {
        error!("Schema integrity failure in step {step}: {e}");
    }
    tree
}

fn compile_entries(
    entries: &[(usize, &FieldSchema)],
    step: u32,
) -> Result<Vec<FieldNode>, SchemaError> {
    if entries.is_empty() {
        return Err(SchemaError::EmptyStep { step });
    }
    let checked = check_entries(entries, step)?;
    checked
        .iter()
        .map(|c| compile_field(c, step, &Placement::TopLevel))
        .collect()
}

fn check_entries<'a>(
    entries: &[(usize, &'a FieldSchema)],
    step: u32,
) -> Result<Vec<Checked<'a>>, SchemaError> {
    let mut seen = HashSet::new();
    let mut checked = Vec::with_capacity(entries.len());

    for &(index, field) in entries {
        let name = field.name.as_deref().filter(|n| !n.is_empty());
        let (Some(order), Some(name), Some(field_type)) = (field.order, name, field.field_type)
        else {
            let missing = [
                ("order", field.order.is_none()),
                ("name", name.is_none()),
                ("type", field.field_type.is_none()),
            ]
            .into_iter()
            .filter_map(|(key, missing)| missing.then_some(key))
            .collect();
            return Err(SchemaError::MissingKeys { index, missing });
        };

        if name.contains(GROUP_KEY_SEPARATOR) {
            return Err(SchemaError::ReservedSeparator {
                index,
                name: name.to_string(),
            });
        }
        if field_type.needs_options() && field.options.is_empty() {
            return Err(SchemaError::MissingOptions {
                index,
                name: name.to_string(),
                field_type,
            });
        }
        if field_type == FieldType::Addon && field.schema.as_ref().is_none_or(Vec::is_empty) {
            return Err(SchemaError::MissingSubSchema {
                index,
                name: name.to_string(),
            });
        }
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateName {
                step,
                name: name.to_string(),
            });
        }

        checked.push(Checked {
            index,
            order,
            name,
            field_type,
            field,
        });
    }

    // `sort_by_key` is stable, so equal orders keep their schema order.
    checked.sort_by_key(|c| c.order);
    Ok(checked)
}

fn compile_field(
    entry: &Checked<'_>,
    step: u32,
    placement: &Placement<'_>,
) -> Result<FieldNode, SchemaError> {
    let field = entry.field;
    let (key, supplied) = match placement {
        Placement::TopLevel | Placement::Template => (entry.name.to_string(), None),
        Placement::Group { parent_key, group } => (
            group_key(parent_key, entry.name, group.order),
            group.get(entry.name),
        ),
    };

    let kind = if entry.field_type == FieldType::Addon {
        let groups = match supplied {
            Some(FieldValue::Groups(groups)) => groups.clone(),
            // An empty JSON list reads as an empty option list.
            Some(FieldValue::Many(values)) if values.is_empty() => Vec::new(),
            Some(_) => return Err(invalid_initial(entry)),
            None => initial_groups(entry)?,
        };
        let sub_schema = field.schema.as_deref().unwrap_or_default();
        compile_addon(entry.name, &key, sub_schema, groups, step)?
    } else {
        let initial = match supplied {
            Some(value) => Some(value.clone()),
            None => initial_value(entry)?,
        };
        FieldKind::Simple { initial }
    };

    Ok(FieldNode {
        id: field.id.clone(),
        name: entry.name.to_string(),
        key,
        order: entry.order,
        field_type: entry.field_type,
        required: field.required,
        label: field.label.clone(),
        placeholder: field.placeholder.clone(),
        options: field.options.clone(),
        minimum_required: field.minimum_required,
        kind,
    })
}

/// Compiles an addon's template and groups.
///
/// Group sub-fields are keyed below `key`, the addon's own capture key, so
/// that keys stay unique through nested addons.
fn compile_addon(
    name: &str,
    key: &str,
    sub_schema: &[FieldSchema],
    mut groups: Vec<AddOnGroup>,
    step: u32,
) -> Result<FieldKind, SchemaError> {
    let nest = |e| SchemaError::nested(name, e);

    let entries = sub_schema.iter().enumerate().collect::<Vec<_>>();
    let checked = check_entries(&entries, step).map_err(nest)?;

    let template = checked
        .iter()
        .map(|c| compile_field(c, step, &Placement::Template))
        .collect::<Result<Vec<_>, _>>()
        .map_err(nest)?;

    groups.sort_by_key(|g| g.order);
    groups.dedup_by_key(|g| g.order);

    let groups = groups
        .iter()
        .map(|group| {
            let placement = Placement::Group {
                parent_key: key,
                group,
            };
            let fields = checked
                .iter()
                .map(|c| compile_field(c, step, &placement))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GroupTree {
                parent: name.to_string(),
                order: group.order,
                fields,
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()
        .map_err(nest)?;

    Ok(FieldKind::Addon { template, groups })
}

fn initial_value(entry: &Checked<'_>) -> Result<Option<FieldValue>, SchemaError> {
    match &entry.field.value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => match FieldValue::from_json(value) {
            Some(FieldValue::Groups(_)) | None => Err(invalid_initial(entry)),
            Some(v) => Ok(Some(v)),
        },
    }
}

fn initial_groups(entry: &Checked<'_>) -> Result<Vec<AddOnGroup>, SchemaError> {
    match &entry.field.value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            debug!("addon `{}` at index {}: {e}", entry.name, entry.index);
            invalid_initial(entry)
        }),
    }
}

fn invalid_initial(entry: &Checked<'_>) -> SchemaError {
    SchemaError::InvalidInitialValue {
        name: entry.name.to_string(),
        field_type: entry.field_type,
    }
}
