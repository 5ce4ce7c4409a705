// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_args_count, ensure_bool, ensure_string};
use crate::builtins::{Builtin, BuiltinContext, BuiltinFcn};
use crate::value::Value;

use std::collections::HashMap;

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

pub fn register(m: &mut HashMap<&'static str, (Builtin, BuiltinFcn)>) {
    m.insert(
        "aws.isVirtualHostableS3Bucket",
        (Builtin::AwsIsVirtualHostableS3Bucket, is_virtual_hostable_s3_bucket),
    );
}

lazy_static! {
    static ref DOTS_ALLOWED: Regex = Regex::new(r"^[a-z\d][a-z\d\-.]{1,61}[a-z\d]$")
        .expect("DOTS_ALLOWED should be a valid regex");
    static ref DOTS_DISALLOWED: Regex = Regex::new(r"^[a-z\d][a-z\d\-]{1,61}[a-z\d]$")
        .expect("DOTS_DISALLOWED should be a valid regex");
    static ref IP_ADDRESS: Regex =
        Regex::new(r"^(\d+\.){3}\d+$").expect("IP_ADDRESS should be a valid regex");
    static ref DASH_DOT_SEPARATOR: Regex =
        Regex::new(r"[.-]{2}").expect("DASH_DOT_SEPARATOR should be a valid regex");
}

fn is_virtual_hostable_s3_bucket(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "aws.isVirtualHostableS3Bucket";
    ensure_args_count(name, args, 2)?;
    let bucket = ensure_string(name, &args[0])?;
    let allow_sub_domains = ensure_bool(name, &args[1])?;
    Ok(Value::Bool(virtual_hostable(&bucket, allow_sub_domains)))
}

/// Whether `bucket` can be used as a DNS label in a virtual hosted style S3 URL.
pub fn virtual_hostable(bucket: &str, allow_sub_domains: bool) -> bool {
    match allow_sub_domains {
        true => {
            DOTS_ALLOWED.is_match(bucket)
                && !IP_ADDRESS.is_match(bucket)
                && !DASH_DOT_SEPARATOR.is_match(bucket)
        }
        false => DOTS_DISALLOWED.is_match(bucket),
    }
}
