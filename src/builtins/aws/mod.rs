// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod arn;
pub mod partition;
pub mod s3;

use crate::builtins::utils::{ensure_args_count, ensure_string};
use crate::builtins::{Builtin, BuiltinContext, BuiltinFcn};
use crate::value::Value;

use std::collections::HashMap;

use anyhow::Result;

pub fn register(m: &mut HashMap<&'static str, (Builtin, BuiltinFcn)>) {
    m.insert("aws.partition", (Builtin::AwsPartition, aws_partition));
    m.insert("aws.parseArn", (Builtin::AwsParseArn, parse_arn));
    s3::register(m);
}

fn aws_partition(ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "aws.partition";
    ensure_args_count(name, args, 1)?;
    let region = ensure_string(name, &args[0])?;
    Ok(Value::from(ctx.partitions.lookup(&region)))
}

fn parse_arn(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "aws.parseArn";
    ensure_args_count(name, args, 1)?;
    let s = ensure_string(name, &args[0])?;
    Ok(Value::from(arn::Arn::parse(&s)))
}
