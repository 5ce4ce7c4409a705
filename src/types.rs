// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use anyhow::{bail, Result};

/// Static type of an expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Type {
    /// Signature wildcard. Also stands in for expressions that failed to type check.
    Any,
    String,
    Bool,
    Integer,
    Array(Box<Type>),
    Record(Rc<BTreeMap<Rc<str>, Type>>),
    Endpoint,
    Empty,
    Optional(Box<Type>),
}

const OPTIONAL_HINT: &str =
    "use `assign` in a condition or `isSet` to prove that this value is non-null";

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::String => write!(f, "String"),
            Type::Bool => write!(f, "Bool"),
            Type::Integer => write!(f, "Integer"),
            Type::Array(inner) => write!(f, "Array<{inner}>"),
            Type::Record(fields) => {
                write!(f, "Record{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
            Type::Endpoint => write!(f, "Endpoint"),
            Type::Empty => write!(f, "Empty"),
            Type::Optional(inner) => write!(f, "Option<{inner}>"),
        }
    }
}

impl Type {
    pub fn array(inner: Type) -> Type {
        Type::Array(Box::new(inner))
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Type)>) -> Type {
        Type::Record(Rc::new(
            fields
                .into_iter()
                .map(|(name, ty)| (Rc::from(name), ty))
                .collect(),
        ))
    }

    /// Wrap in `Optional`. Already optional types are returned unchanged.
    pub fn optional(self) -> Type {
        match self {
            Type::Optional(_) => self,
            _ => Type::Optional(Box::new(self)),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    /// The type a value has once it is known to be set.
    pub fn proven_truthy(&self) -> Type {
        match self {
            Type::Optional(inner) => inner.as_ref().clone(),
            _ => self.clone(),
        }
    }

    /// Whether a value of type `self` may be passed where `expected` is declared.
    pub fn is_a(&self, expected: &Type) -> bool {
        match (self, expected) {
            (_, Type::Any) | (Type::Any, _) => true,
            // An empty array literal fits any array.
            (Type::Array(a), Type::Array(b)) => matches!(a.as_ref(), Type::Any) || a.is_a(b),
            (Type::Optional(a), Type::Optional(b)) => a.is_a(b),
            (Type::Record(a), Type::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, ta), (kb, tb))| ka == kb && ta.is_a(tb))
            }
            _ => self == expected,
        }
    }

    fn expect(&self, expected: &Type, what: &str) -> Result<()> {
        if self.is_a(expected) {
            return Ok(());
        }
        if let Type::Optional(inner) = self {
            if inner.is_a(expected) {
                bail!("Expected {what} of type {expected} but found {self}. hint: {OPTIONAL_HINT}");
            }
        }
        bail!("Expected {what} of type {expected} but found {self}")
    }

    pub fn expect_string(&self) -> Result<()> {
        self.expect(&Type::String, "string")
    }

    pub fn expect_array(&self) -> Result<&Type> {
        match self {
            Type::Array(inner) => Ok(inner),
            Type::Optional(inner) if matches!(inner.as_ref(), Type::Array(_)) => {
                bail!("Expected array but found {self}. hint: {OPTIONAL_HINT}")
            }
            _ => bail!("Expected array but found {self}"),
        }
    }

    pub fn expect_record(&self) -> Result<&BTreeMap<Rc<str>, Type>> {
        match self {
            Type::Record(fields) => Ok(fields),
            Type::Optional(inner) if matches!(inner.as_ref(), Type::Record(_)) => {
                bail!("Expected record but found {self}. hint: {OPTIONAL_HINT}")
            }
            _ => bail!("Expected record but found {self}"),
        }
    }

    /// Conditions must be boolean or optional.
    pub fn expect_condition(&self) -> Result<()> {
        match self {
            Type::Bool | Type::Optional(_) => Ok(()),
            _ => bail!("Expected condition of type Bool or Option<_> but found {self}"),
        }
    }

    /// The most specific type covering both `self` and `other`, if any.
    pub fn join(&self, other: &Type) -> Option<Type> {
        let base = self.proven_truthy();
        if base != other.proven_truthy() {
            return None;
        }
        if self.is_optional() || other.is_optional() {
            Some(base.optional())
        } else {
            Some(base)
        }
    }
}
