// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod aws;
pub mod boolean;
pub mod strings;
pub mod url;
pub mod utils;

use crate::builtins::aws::partition::PartitionTable;
use crate::types::Type;
use crate::value::Value;
use crate::Rc;

use core::fmt;
use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};
use lazy_static::lazy_static;

/// Everything a builtin may read besides its arguments.
pub struct BuiltinContext<'a> {
    pub partitions: &'a PartitionTable,
}

pub type BuiltinFcn = fn(&BuiltinContext, &[Value]) -> Result<Value>;

/// Closed set of functions known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builtin {
    IsSet,
    Not,
    BooleanEquals,
    StringEquals,
    Coalesce,
    Ite,
    Substring,
    UriEncode,
    Split,
    IsValidHostLabel,
    ParseUrl,
    AwsPartition,
    AwsParseArn,
    AwsIsVirtualHostableS3Bucket,
}

/// How a function's arguments and result are typed.
pub enum Signature {
    Fixed { args: Vec<Type>, ret: Type },
    Custom(fn(&[Type]) -> Result<Type>),
}

#[rustfmt::skip]
lazy_static! {
    pub static ref BUILTINS: HashMap<&'static str, (Builtin, BuiltinFcn)> = {
	let mut m : HashMap<&'static str, (Builtin, BuiltinFcn)> = HashMap::new();

	boolean::register(&mut m);
	strings::register(&mut m);
	url::register(&mut m);
	aws::register(&mut m);

	m
    };
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        BUILTINS.get(name).map(|(b, _)| *b)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::IsSet => "isSet",
            Builtin::Not => "not",
            Builtin::BooleanEquals => "booleanEquals",
            Builtin::StringEquals => "stringEquals",
            Builtin::Coalesce => "coalesce",
            Builtin::Ite => "ite",
            Builtin::Substring => "substring",
            Builtin::UriEncode => "uriEncode",
            Builtin::Split => "split",
            Builtin::IsValidHostLabel => "isValidHostLabel",
            Builtin::ParseUrl => "parseURL",
            Builtin::AwsPartition => "aws.partition",
            Builtin::AwsParseArn => "aws.parseArn",
            Builtin::AwsIsVirtualHostableS3Bucket => "aws.isVirtualHostableS3Bucket",
        }
    }

    pub fn signature(&self) -> Signature {
        let fixed = |args: Vec<Type>, ret: Type| Signature::Fixed { args, ret };
        match self {
            Builtin::IsSet => fixed(vec![Type::Any], Type::Bool),
            Builtin::Not => fixed(vec![Type::Bool], Type::Bool),
            Builtin::BooleanEquals => fixed(vec![Type::Bool, Type::Bool], Type::Bool),
            Builtin::StringEquals => fixed(vec![Type::String, Type::String], Type::Bool),
            Builtin::Coalesce => Signature::Custom(boolean::coalesce_type),
            Builtin::Ite => Signature::Custom(boolean::ite_type),
            Builtin::Substring => fixed(
                vec![Type::String, Type::Integer, Type::Integer, Type::Bool],
                Type::String.optional(),
            ),
            Builtin::UriEncode => fixed(vec![Type::String], Type::String),
            Builtin::Split => fixed(
                vec![Type::String, Type::String, Type::Integer],
                Type::array(Type::String),
            ),
            Builtin::IsValidHostLabel => fixed(vec![Type::String, Type::Bool], Type::Bool),
            Builtin::ParseUrl => fixed(vec![Type::String], url::url_type().optional()),
            Builtin::AwsPartition => fixed(
                vec![Type::String],
                aws::partition::partition_type().optional(),
            ),
            Builtin::AwsParseArn => fixed(vec![Type::String], aws::arn::arn_type().optional()),
            Builtin::AwsIsVirtualHostableS3Bucket => {
                fixed(vec![Type::String, Type::Bool], Type::Bool)
            }
        }
    }

    /// Result type of a call with the given argument types.
    pub fn typecheck(&self, args: &[Type]) -> Result<Type> {
        match self.signature() {
            Signature::Fixed { args: expected, ret } => {
                check_arguments(self.name(), &expected, args)?;
                Ok(ret)
            }
            Signature::Custom(f) => f(args),
        }
    }

    pub fn eval(&self, ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
        match BUILTINS.get(self.name()) {
            Some((_, fcn)) => fcn(ctx, args),
            None => bail!("builtin `{}` is not registered", self.name()),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn format_types(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check argument count and types against a fixed signature.
pub fn check_arguments(fcn: &str, expected: &[Type], found: &[Type]) -> Result<()> {
    if expected.len() != found.len() {
        bail!(
            "`{fcn}` expects {} argument(s) ({}) but found {} ({})",
            expected.len(),
            format_types(expected),
            found.len(),
            format_types(found)
        );
    }
    for (idx, (e, f)) in expected.iter().zip(found.iter()).enumerate() {
        if !f.is_a(e) {
            let hint = match f {
                Type::Optional(inner) if inner.is_a(e) => {
                    ". hint: use `assign` in a condition or `isSet` to prove that this value is non-null"
                }
                _ => "",
            };
            bail!(
                "Unexpected type in argument {} of `{fcn}`: Expected {e} but found {f}{hint}",
                idx + 1
            );
        }
    }
    Ok(())
}

/// A function registered by the embedding application.
#[derive(Clone)]
pub struct Extension {
    pub args: Vec<Type>,
    pub ret: Type,
    pub fcn: ExtensionFcn,
}

/// Extensions registered with an engine, by function name.
pub type Extensions = BTreeMap<String, Extension>;

pub type ExtensionFcn = Rc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Extension({}) -> {}", format_types(&self.args), self.ret)
    }
}

impl Extension {
    pub fn new<F>(args: Vec<Type>, ret: Type, fcn: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            args,
            ret,
            fcn: Rc::new(fcn),
        }
    }
}
