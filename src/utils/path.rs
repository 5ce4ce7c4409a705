// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute paths used by `getAttr` and by `{name#path}` template placeholders.

use crate::types::Type;
use crate::value::Value;
use crate::Rc;

use core::fmt;

use anyhow::{bail, Result};

/// Component of an attribute path such as `resourceId[2]` or `a.b`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessComponent {
    /// Record field access (e.g., .field_name)
    Field(Rc<str>),
    /// Array element access (e.g., [2]). Negative indexes count from the end.
    Index(i64),
}

impl fmt::Display for AccessComponent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessComponent::Field(name) => write!(f, "{name}"),
            AccessComponent::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

/// Parse a dotted path. `a.b[1]` yields `[Field(a), Field(b), Index(1)]`.
pub fn parse_path(path: &str) -> Result<Vec<AccessComponent>> {
    if path.is_empty() {
        bail!("Invalid argument to getAttr: path may not be empty");
    }

    let mut components = vec![];
    for component in path.split('.') {
        match component.find('[') {
            Some(pos) => {
                let (field, slice) = component.split_at(pos);
                let Some(number) = slice
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                else {
                    bail!("Invalid path component: {component}. Must end with `]`");
                };
                let index = match number.parse::<i64>() {
                    Ok(idx) => idx,
                    Err(_) => bail!("{slice} could not be parsed as a number"),
                };
                if !field.is_empty() {
                    components.push(AccessComponent::Field(field.into()));
                }
                components.push(AccessComponent::Index(index));
            }
            None if component.is_empty() => {
                bail!("Invalid path `{path}`: empty path component")
            }
            None => components.push(AccessComponent::Field(component.into())),
        }
    }
    Ok(components)
}

/// Static type of `base` projected through `path`.
pub fn project_type(base: &Type, path: &[AccessComponent]) -> Result<Type> {
    let mut ty = base.clone();
    for component in path {
        if ty == Type::Any {
            break;
        }
        let next = match component {
            AccessComponent::Field(name) => {
                let fields = match ty.expect_record() {
                    Ok(fields) => fields,
                    Err(e) => bail!("while resolving {component} in {ty}: {e}"),
                };
                match fields.get(name) {
                    Some(t) => t.clone(),
                    None => bail!("while resolving {component} in {ty}: {ty} does not contain field {name}"),
                }
            }
            AccessComponent::Index(_) => match ty.expect_array() {
                Ok(member) => member.clone().optional(),
                Err(e) => bail!("while resolving {component} in {ty}: {e}"),
            },
        };
        ty = next;
    }
    Ok(ty)
}

/// Project `base` through `path`. Missing fields and out of range indexes yield `Empty`.
pub fn project_value(base: &Value, path: &[AccessComponent]) -> Value {
    let mut value = base;
    for component in path {
        value = match component {
            AccessComponent::Field(name) => &value[name.as_ref()],
            AccessComponent::Index(idx) => value.element(*idx),
        };
    }
    value.clone()
}
