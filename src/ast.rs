// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::Builtin;
use crate::types::Type;
use crate::utils::path::AccessComponent;
use crate::value::Value;
use crate::Rc;

use core::{cmp, fmt, ops::Deref};
use std::collections::BTreeMap;

// Shared, immutable AST node. Identity is pointer identity.
pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

/// Callee of a function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    Builtin(Builtin),
    /// Resolved against the engine's extension registry.
    Extension(Rc<str>),
}

#[derive(Debug)]
pub struct FnCall {
    pub name: Rc<str>,
    pub function: Function,
    pub args: Vec<Ref<Expr>>,
}

#[derive(Debug)]
pub enum Expr {
    /// Reference to a parameter or to an earlier `assign`.
    Ref(Rc<str>),
    Literal(Literal),
    Call(FnCall),
    /// `getAttr(target, "a.b[1]")`, also produced by `{target#a.b[1]}` placeholders.
    GetAttr {
        target: Ref<Expr>,
        path: Vec<AccessComponent>,
        raw: Rc<str>,
    },
}

#[derive(Debug)]
pub enum Literal {
    String(Template),
    Bool(bool),
    Integer(i64),
    Array(Vec<Literal>),
    Record(BTreeMap<Rc<str>, Literal>),
}

/// A string literal with `{...}` placeholders.
#[derive(Debug)]
pub struct Template {
    pub raw: Rc<str>,
    pub parts: Vec<TemplatePart>,
}

#[derive(Debug)]
pub enum TemplatePart {
    Literal(Rc<str>),
    Dynamic { raw: Rc<str>, expr: Ref<Expr> },
}

impl Template {
    /// A template with no placeholders.
    pub fn as_static(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [] => Some(""),
            [TemplatePart::Literal(s)] => Some(s.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Condition {
    pub expr: Ref<Expr>,
    pub assign: Option<Rc<str>>,
}

#[derive(Debug)]
pub struct EndpointTemplate {
    pub url: Ref<Expr>,
    pub headers: BTreeMap<Rc<str>, Vec<Ref<Expr>>>,
    pub properties: BTreeMap<Rc<str>, Literal>,
}

#[derive(Debug)]
pub enum RuleAction {
    Endpoint(EndpointTemplate),
    Error(Ref<Expr>),
    Tree(Vec<Ref<Rule>>),
}

#[derive(Debug)]
pub struct Rule {
    pub conditions: Vec<Condition>,
    pub action: RuleAction,
    pub documentation: Option<Rc<str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Boolean,
    StringArray,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Boolean => "boolean",
            ParameterType::StringArray => "stringArray",
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            ParameterType::String => Type::String,
            ParameterType::Boolean => Type::Bool,
            ParameterType::StringArray => Type::array(Type::String),
        }
    }

    /// Whether `value` is an instance of this parameter type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ParameterType::String, Value::String(_)) => true,
            (ParameterType::Boolean, Value::Bool(_)) => true,
            (ParameterType::StringArray, Value::Array(items)) => {
                items.iter().all(|v| matches!(v, Value::String(_)))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecated {
    pub message: Option<Rc<str>>,
    pub since: Option<Rc<str>>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: Rc<str>,
    pub ty: ParameterType,
    pub required: bool,
    pub default: Option<Value>,
    pub built_in: Option<Rc<str>>,
    pub documentation: Option<Rc<str>>,
    pub deprecated: Option<Deprecated>,
}

impl Parameter {
    /// Static type of a reference to this parameter.
    pub fn ty(&self) -> Type {
        if self.required {
            self.ty.ty()
        } else {
            self.ty.ty().optional()
        }
    }
}

#[derive(Debug)]
pub struct RuleSet {
    pub version: Rc<str>,
    pub parameters: Vec<Parameter>,
    pub rules: Vec<Ref<Rule>>,
}

impl RuleSet {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name.as_ref() == name)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Ref(name) => write!(f, "{name}"),
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Call(call) => write!(f, "{call}"),
            Expr::GetAttr { target, raw, .. } => write!(f, "{}#{raw}", target.as_ref()),
        }
    }
}

impl fmt::Display for FnCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg.as_ref())?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::String(t) => write!(f, "\"{}\"", t.raw),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Literal::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
