// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_args_count, ensure_bool, ensure_integer, ensure_string};
use crate::builtins::{Builtin, BuiltinContext, BuiltinFcn};
use crate::value::Value;

use core::fmt::Write;
use std::collections::HashMap;

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

pub fn register(m: &mut HashMap<&'static str, (Builtin, BuiltinFcn)>) {
    m.insert("stringEquals", (Builtin::StringEquals, string_equals));
    m.insert("substring", (Builtin::Substring, substring));
    m.insert("uriEncode", (Builtin::UriEncode, uri_encode));
    m.insert("split", (Builtin::Split, split));
    m.insert("isValidHostLabel", (Builtin::IsValidHostLabel, is_valid_host_label));
}

lazy_static! {
    static ref HOST_LABEL: Regex =
        Regex::new(r"^[a-zA-Z\d][a-zA-Z\d\-]{0,62}$").expect("HOST_LABEL should be a valid regex");
}

fn string_equals(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "stringEquals";
    ensure_args_count(name, args, 2)?;
    let a = ensure_string(name, &args[0])?;
    let b = ensure_string(name, &args[1])?;
    Ok(Value::Bool(a == b))
}

fn substring(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "substring";
    ensure_args_count(name, args, 4)?;
    let s = ensure_string(name, &args[0])?;
    let start = ensure_integer(name, &args[1])?;
    let stop = ensure_integer(name, &args[2])?;
    let reverse = ensure_bool(name, &args[3])?;
    Ok(Value::from(get_substring(&s, start, stop, reverse)))
}

/// Slice of an ASCII string. `reverse` counts both bounds from the end.
pub fn get_substring(s: &str, start: i64, stop: i64, reverse: bool) -> Option<&str> {
    if !s.is_ascii() {
        return None;
    }
    let (Ok(start), Ok(stop)) = (usize::try_from(start), usize::try_from(stop)) else {
        return None;
    };
    if start >= stop || s.len() < stop {
        return None;
    }
    match reverse {
        false => Some(&s[start..stop]),
        true => Some(&s[s.len() - stop..s.len() - start]),
    }
}

fn uri_encode(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "uriEncode";
    ensure_args_count(name, args, 1)?;
    let s = ensure_string(name, &args[0])?;
    Ok(Value::from(percent_encode(&s)))
}

/// Percent-encode every byte outside `A-Z a-z 0-9 - _ . ~`.
pub fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(b as char)
            }
            _ => {
                let _ = write!(encoded, "%{b:02X}");
            }
        }
    }
    encoded
}

fn split(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "split";
    ensure_args_count(name, args, 3)?;
    let s = ensure_string(name, &args[0])?;
    let delimiter = ensure_string(name, &args[1])?;
    let limit = ensure_integer(name, &args[2])?;
    Ok(Value::from(
        split_string(&s, &delimiter, limit)
            .into_iter()
            .map(Value::from)
            .collect::<Vec<_>>(),
    ))
}

/// Split on `delimiter` into at most `limit` parts. A limit of 0 (or below) is unlimited.
pub fn split_string<'a>(s: &'a str, delimiter: &str, limit: i64) -> Vec<&'a str> {
    if delimiter.is_empty() {
        return vec![s];
    }
    match usize::try_from(limit) {
        Ok(limit) if limit > 0 => s.splitn(limit, delimiter).collect(),
        _ => s.split(delimiter).collect(),
    }
}

fn is_valid_host_label(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "isValidHostLabel";
    ensure_args_count(name, args, 2)?;
    let s = ensure_string(name, &args[0])?;
    let allow_sub_domains = ensure_bool(name, &args[1])?;
    Ok(Value::Bool(host_label(&s, allow_sub_domains)))
}

/// RFC 1123 host label. With `allow_sub_domains` every dot separated label must be valid.
pub fn host_label(s: &str, allow_sub_domains: bool) -> bool {
    match allow_sub_domains {
        true => s.split('.').all(|label| HOST_LABEL.is_match(label)),
        false => HOST_LABEL.is_match(s),
    }
}
