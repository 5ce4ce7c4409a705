// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::types::Type;
use crate::value::Value;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

/// A parsed Amazon Resource Name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource_id: Vec<String>,
}

pub fn arn_type() -> Type {
    Type::record([
        ("partition", Type::String),
        ("service", Type::String),
        ("region", Type::String),
        ("accountId", Type::String),
        ("resourceId", Type::array(Type::String)),
    ])
}

impl Arn {
    /// Parse `arn:partition:service:region:account:resource`.
    ///
    /// The resource is split on `:` and `/`. Empty trailing segments are kept, so
    /// `outpost:` yields `["outpost", ""]`, while an entirely empty resource is rejected.
    pub fn parse(s: &str) -> Option<Arn> {
        let base: Vec<&str> = s.splitn(6, ':').collect();
        if base.len() != 6 || base[0] != "arn" {
            return None;
        }
        if base[1].is_empty() || base[2].is_empty() || base[5].is_empty() {
            return None;
        }
        Some(Arn {
            partition: base[1].to_string(),
            service: base[2].to_string(),
            region: base[3].to_string(),
            account_id: base[4].to_string(),
            resource_id: base[5]
                .split([':', '/'])
                .map(|s| s.to_string())
                .collect(),
        })
    }
}

impl fmt::Display for Arn {
    // Resource segments are rejoined with `:`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition,
            self.service,
            self.region,
            self.account_id,
            self.resource_id.join(":")
        )
    }
}

impl From<Arn> for Value {
    fn from(arn: Arn) -> Self {
        let mut fields: BTreeMap<Rc<str>, Value> = BTreeMap::new();
        fields.insert("partition".into(), Value::from(arn.partition));
        fields.insert("service".into(), Value::from(arn.service));
        fields.insert("region".into(), Value::from(arn.region));
        fields.insert("accountId".into(), Value::from(arn.account_id));
        fields.insert(
            "resourceId".into(),
            Value::from(
                arn.resource_id
                    .into_iter()
                    .map(Value::from)
                    .collect::<Vec<_>>(),
            ),
        );
        Value::from(fields)
    }
}
