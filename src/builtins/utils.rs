// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::value::Value;
use crate::Rc;

use anyhow::{bail, Result};

pub fn ensure_args_count(fcn: &'static str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        if expected == 1 {
            bail!("`{fcn}` expects 1 argument")
        } else {
            bail!("`{fcn}` expects {expected} arguments")
        }
    }
    Ok(())
}

pub fn ensure_string(fcn: &str, v: &Value) -> Result<Rc<str>> {
    Ok(match &v {
        Value::String(s) => s.clone(),
        _ => bail!("`{fcn}` expects string argument. Got `{v}` instead"),
    })
}

pub fn ensure_bool(fcn: &str, v: &Value) -> Result<bool> {
    Ok(match &v {
        Value::Bool(b) => *b,
        _ => bail!("`{fcn}` expects boolean argument. Got `{v}` instead"),
    })
}

pub fn ensure_integer(fcn: &str, v: &Value) -> Result<i64> {
    Ok(match &v {
        Value::Integer(n) => *n,
        _ => bail!("`{fcn}` expects integer argument. Got `{v}` instead"),
    })
}
