// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::types::Type;
use crate::value::Value;
use crate::Rc;

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Metadata reported by `aws.partition` for a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartitionOutputs {
    pub name: String,
    pub dns_suffix: String,
    pub dual_stack_dns_suffix: String,
    #[serde(rename = "supportsFIPS")]
    pub supports_fips: bool,
    pub supports_dual_stack: bool,
    pub implicit_global_region: String,
}

// Per-region overrides of the partition outputs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionOverrides {
    name: Option<String>,
    dns_suffix: Option<String>,
    dual_stack_dns_suffix: Option<String>,
    #[serde(rename = "supportsFIPS")]
    supports_fips: Option<bool>,
    supports_dual_stack: Option<bool>,
    implicit_global_region: Option<String>,
}

impl RegionOverrides {
    fn apply(self, base: &PartitionOutputs) -> PartitionOutputs {
        PartitionOutputs {
            name: self.name.unwrap_or_else(|| base.name.clone()),
            dns_suffix: self.dns_suffix.unwrap_or_else(|| base.dns_suffix.clone()),
            dual_stack_dns_suffix: self
                .dual_stack_dns_suffix
                .unwrap_or_else(|| base.dual_stack_dns_suffix.clone()),
            supports_fips: self.supports_fips.unwrap_or(base.supports_fips),
            supports_dual_stack: self.supports_dual_stack.unwrap_or(base.supports_dual_stack),
            implicit_global_region: self
                .implicit_global_region
                .unwrap_or_else(|| base.implicit_global_region.clone()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartitionDocument {
    id: String,
    region_regex: String,
    #[serde(default)]
    regions: BTreeMap<String, RegionOverrides>,
    outputs: PartitionOutputs,
}

#[derive(Deserialize)]
struct PartitionTableDocument {
    version: String,
    partitions: Vec<PartitionDocument>,
}

#[derive(Debug, Clone)]
pub struct Partition {
    pub id: String,
    pub region_regex: Regex,
    /// Enumerated regions with their effective outputs.
    pub regions: BTreeMap<String, PartitionOutputs>,
    pub outputs: PartitionOutputs,
}

/// Ordered list of partitions. Immutable once built; engines swap whole tables.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    pub version: String,
    partitions: Vec<Partition>,
    // Region name to index of the first partition enumerating it.
    region_map: HashMap<String, usize>,
}

lazy_static! {
    static ref DEFAULT_PARTITIONS: PartitionTable =
        PartitionTable::from_json_str(include_str!("partitions.json"))
            .expect("partitions.json should be a valid partition table");
}

pub fn partition_type() -> Type {
    Type::record([
        ("name", Type::String),
        ("dnsSuffix", Type::String),
        ("dualStackDnsSuffix", Type::String),
        ("supportsFIPS", Type::Bool),
        ("supportsDualStack", Type::Bool),
        ("implicitGlobalRegion", Type::String),
        ("inferred", Type::Bool),
    ])
}

impl Default for PartitionTable {
    /// The table shipped with the crate.
    fn default() -> Self {
        DEFAULT_PARTITIONS.clone()
    }
}

impl PartitionTable {
    pub fn from_json_str(json: &str) -> Result<PartitionTable> {
        let doc: PartitionTableDocument =
            serde_json::from_str(json).context("invalid partition table")?;
        Self::from_document(doc)
    }

    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<PartitionTable> {
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => bail!("Failed to read {}. {e}", path.as_ref().display()),
        };
        Self::from_json_str(&contents)
            .with_context(|| format!("while loading {}", path.as_ref().display()))
    }

    fn from_document(doc: PartitionTableDocument) -> Result<PartitionTable> {
        let mut partitions = Vec::with_capacity(doc.partitions.len());
        let mut region_map = HashMap::new();
        for (idx, p) in doc.partitions.into_iter().enumerate() {
            if partitions.iter().any(|q: &Partition| q.id == p.id) {
                bail!("duplicate partition `{}`", p.id);
            }
            let region_regex = Regex::new(&format!("^(?:{})$", p.region_regex))
                .with_context(|| format!("invalid regionRegex for partition `{}`", p.id))?;
            let regions: BTreeMap<String, PartitionOutputs> = p
                .regions
                .into_iter()
                .map(|(name, overrides)| (name, overrides.apply(&p.outputs)))
                .collect();
            for region in regions.keys() {
                region_map.entry(region.clone()).or_insert(idx);
            }
            partitions.push(Partition {
                id: p.id,
                region_regex,
                regions,
                outputs: p.outputs,
            });
        }
        Ok(PartitionTable {
            version: doc.version,
            partitions,
            region_map,
        })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Outputs for `region` and whether they were inferred rather than enumerated.
    ///
    /// Enumerated regions win, then the first partition whose regex matches, then `aws`.
    pub fn resolve(&self, region: &str) -> Option<(&Partition, &PartitionOutputs, bool)> {
        if let Some(p) = self.region_map.get(region).map(|idx| &self.partitions[*idx]) {
            if let Some(outputs) = p.regions.get(region) {
                return Some((p, outputs, false));
            }
        }

        if let Some(p) = self
            .partitions
            .iter()
            .find(|p| p.region_regex.is_match(region))
        {
            return Some((p, &p.outputs, true));
        }

        self.partitions
            .iter()
            .find(|p| p.id == "aws")
            .map(|p| (p, &p.outputs, true))
    }

    /// The `aws.partition` record for `region`.
    pub fn lookup(&self, region: &str) -> Option<Value> {
        let (_, outputs, inferred) = self.resolve(region)?;
        let mut fields: BTreeMap<Rc<str>, Value> = BTreeMap::new();
        fields.insert("name".into(), Value::from(outputs.name.as_str()));
        fields.insert("dnsSuffix".into(), Value::from(outputs.dns_suffix.as_str()));
        fields.insert(
            "dualStackDnsSuffix".into(),
            Value::from(outputs.dual_stack_dns_suffix.as_str()),
        );
        fields.insert("supportsFIPS".into(), Value::Bool(outputs.supports_fips));
        fields.insert(
            "supportsDualStack".into(),
            Value::Bool(outputs.supports_dual_stack),
        );
        fields.insert(
            "implicitGlobalRegion".into(),
            Value::from(outputs.implicit_global_region.as_str()),
        );
        fields.insert("inferred".into(), Value::Bool(inferred));
        Some(Value::from(fields))
    }
}
