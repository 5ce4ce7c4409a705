// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_args_count, ensure_bool};
use crate::builtins::{Builtin, BuiltinContext, BuiltinFcn};
use crate::types::Type;
use crate::value::Value;

use std::collections::HashMap;

use anyhow::{bail, Result};

pub fn register(m: &mut HashMap<&'static str, (Builtin, BuiltinFcn)>) {
    m.insert("isSet", (Builtin::IsSet, is_set));
    m.insert("not", (Builtin::Not, not));
    m.insert("booleanEquals", (Builtin::BooleanEquals, boolean_equals));
    m.insert("coalesce", (Builtin::Coalesce, coalesce));
    m.insert("ite", (Builtin::Ite, ite));
}

fn is_set(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    ensure_args_count("isSet", args, 1)?;
    Ok(Value::Bool(!args[0].is_empty()))
}

fn not(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "not";
    ensure_args_count(name, args, 1)?;
    Ok(Value::Bool(!ensure_bool(name, &args[0])?))
}

fn boolean_equals(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "booleanEquals";
    ensure_args_count(name, args, 2)?;
    let a = ensure_bool(name, &args[0])?;
    let b = ensure_bool(name, &args[1])?;
    Ok(Value::Bool(a == b))
}

fn coalesce(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    Ok(args
        .iter()
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or(Value::Empty))
}

fn ite(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "ite";
    ensure_args_count(name, args, 3)?;
    Ok(match ensure_bool(name, &args[0])? {
        true => args[1].clone(),
        false => args[2].clone(),
    })
}

/// `coalesce` is optional only when every argument is.
pub fn coalesce_type(args: &[Type]) -> Result<Type> {
    if args.len() < 2 {
        bail!(
            "`coalesce` expects at least 2 arguments but found {}",
            args.len()
        );
    }
    let base = args[0].proven_truthy();
    let mut all_optional = args[0].is_optional();
    for (idx, ty) in args.iter().enumerate().skip(1) {
        if ty.proven_truthy() != base {
            bail!(
                "Type mismatch in coalesce at argument {}: expected {base} but found {ty}",
                idx + 1
            );
        }
        all_optional &= ty.is_optional();
    }
    Ok(match all_optional {
        true => base.optional(),
        false => base,
    })
}

/// `ite` needs a definite condition and branches sharing a base type.
pub fn ite_type(args: &[Type]) -> Result<Type> {
    if args.len() != 3 {
        bail!("`ite` expects 3 arguments but found {}", args.len());
    }
    match &args[0] {
        Type::Bool => (),
        Type::Optional(inner) if inner.as_ref() == &Type::Bool => bail!(
            "`ite` condition must be a non-optional Boolean but found {}. hint: use `coalesce` to provide a default",
            args[0]
        ),
        other => bail!("`ite` condition must be a non-optional Boolean but found {other}"),
    }
    match args[1].join(&args[2]) {
        Some(ty) => Ok(ty),
        None => bail!(
            "`ite` branches must have the same base type: true branch is {}, false branch is {}",
            args[1],
            args[2]
        ),
    }
}
