//! Expansion of `cpus` grants.
//!
//! A domain's `cpus` property is a repeat group of `(phandle, mask, mode)`
//! tuples: the phandle names a CPU cluster, the mask selects cores within
//! it (bit N = `cpu@N`), and the mode word configures how the cluster is
//! brought up for the domain.

use crate::error::LopError;
use crate::phandle;
use crate::schema::{Schema, SchemaRegistry};
use crate::tree::{NodeId, PropValue, Tree};

/// Decoded execution-mode word of a CPU grant.
///
/// Bit 0 selects lockstep operation, bits 1-2 carry the privilege (EL)
/// level, and bit 31 marks the cluster secure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecMode(u32);

impl ExecMode {
    pub fn from_raw(raw: u32) -> ExecMode {
        ExecMode(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn lockstep(self) -> bool {
        self.0 & 0x1 != 0
    }

    /// Privilege level the cluster starts in.
    pub fn el(self) -> u8 {
        ((self.0 >> 1) & 0x3) as u8
    }

    pub fn secure(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

/// One realized CPU grant of a domain.
#[derive(Clone, Debug)]
pub struct CpuGrant {
    /// The referenced CPU cluster node.
    pub cluster: NodeId,
    /// Raw selection mask, bit N = cpu index N.
    pub mask: u32,
    /// CPU indices selected by the mask, ascending.
    pub cpus: Vec<u8>,
    pub mode: ExecMode,
}

fn schema_of(registry: &SchemaRegistry) -> Schema {
    registry
        .get("cpus")
        .cloned()
        .unwrap_or_else(|| Schema::parse("cpus", "phandle mask mode"))
}

/// Decode the `cpus` property of `node` into grants. Unresolved cluster
/// references are appended to `warnings` and their tuples skipped.
pub fn expand(
    tree: &Tree,
    registry: &SchemaRegistry,
    node: NodeId,
    warnings: &mut Vec<LopError>,
) -> Result<Vec<CpuGrant>, LopError> {
    let schema = schema_of(registry);
    let outcome = phandle::decode(tree, node, "cpus", &schema)?;
    warnings.extend(outcome.skipped);

    let mut grants = Vec::with_capacity(outcome.records.len());
    for rec in &outcome.records {
        let (cluster, mask, mode) = match (rec.node(0), rec.value(1), rec.value(2)) {
            (Some(c), Some(mask), Some(mode)) => (c, mask, mode),
            _ => {
                return Err(LopError::SchemaMismatch {
                    path: tree.path(node)?,
                    prop: "cpus".to_string(),
                    cells: rec.cells().len(),
                    width: 3,
                });
            }
        };
        let cpus = (0u8..32).filter(|&b| mask & (1u32 << b) != 0).collect();
        grants.push(CpuGrant {
            cluster,
            mask,
            cpus,
            mode: ExecMode::from_raw(mode),
        });
    }
    Ok(grants)
}

/// Expand and rewrite: the compact `cpus` property is replaced by one
/// `cpu-grant@N` child per tuple carrying the realized grant.
pub fn apply(
    tree: &mut Tree,
    registry: &SchemaRegistry,
    node: NodeId,
    warnings: &mut Vec<LopError>,
) -> Result<Vec<CpuGrant>, LopError> {
    let grants = expand(tree, registry, node, warnings)?;
    for (i, grant) in grants.iter().enumerate() {
        let child = tree.create(node, &format!("cpu-grant@{}", i))?;
        let cluster_ph = tree.assign_phandle(grant.cluster)?;
        tree.set_property(child, "cluster", PropValue::cell(cluster_ph))?;
        tree.set_property(
            child,
            "cpu-ids",
            PropValue::Cells(grant.cpus.iter().map(|&c| u32::from(c)).collect()),
        )?;
        tree.set_property(child, "el", PropValue::cell(u32::from(grant.mode.el())))?;
        if grant.mode.secure() {
            tree.set_property(child, "secure", PropValue::Empty)?;
        }
        if grant.mode.lockstep() {
            tree.set_property(child, "lockstep", PropValue::Empty)?;
        }
    }
    if !grants.is_empty() {
        tree.remove_property(node, "cpus")?;
    }
    Ok(grants)
}
