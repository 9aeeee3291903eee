//! Expansion of `access` grants.
//!
//! The `access` property is a repeat group of `(phandle, flags)` tuples
//! granting a domain access to a peripheral or memory-region node.

use bitflags::bitflags;

use crate::error::LopError;
use crate::phandle;
use crate::schema::{Schema, SchemaRegistry};
use crate::tree::{NodeId, PropValue, Tree};

bitflags! {
    /// Known bits of an access flag word. Device-specific sub-fields
    /// (the IPI channel enables) live above the low control bits and are
    /// reached through [`AccessGrant::ipi_channels`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Grant is read-only; absent means read/write.
        const READ_ONLY = 1 << 0;
    }
}

/// One realized access grant of a domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessGrant {
    /// The peripheral or memory-region node granted.
    pub target: NodeId,
    /// Raw flag word as encoded.
    pub flags: u32,
}

impl AccessGrant {
    pub fn read_only(&self) -> bool {
        AccessFlags::from_bits_truncate(self.flags).contains(AccessFlags::READ_ONLY)
    }

    /// IPI channel-enable sub-field (bits 8-15).
    pub fn ipi_channels(&self) -> u8 {
        ((self.flags >> 8) & 0xff) as u8
    }
}

fn schema_of(registry: &SchemaRegistry) -> Schema {
    registry
        .get("access")
        .cloned()
        .unwrap_or_else(|| Schema::parse("access", "phandle flags"))
}

/// Decode the `access` property of `node`. Unresolved targets are
/// appended to `warnings` and skipped.
pub fn expand(
    tree: &Tree,
    registry: &SchemaRegistry,
    node: NodeId,
    warnings: &mut Vec<LopError>,
) -> Result<Vec<AccessGrant>, LopError> {
    let schema = schema_of(registry);
    let outcome = phandle::decode(tree, node, "access", &schema)?;
    warnings.extend(outcome.skipped);

    let mut grants = Vec::with_capacity(outcome.records.len());
    for rec in &outcome.records {
        let (target, flags) = match (rec.node(0), rec.value(1)) {
            (Some(t), Some(f)) => (t, f),
            _ => {
                return Err(LopError::SchemaMismatch {
                    path: tree.path(node)?,
                    prop: "access".to_string(),
                    cells: rec.cells().len(),
                    width: 2,
                });
            }
        };
        grants.push(AccessGrant { target, flags });
    }
    Ok(grants)
}

/// Expand and rewrite: the compact `access` property is replaced by one
/// `access@N` child per tuple.
pub fn apply(
    tree: &mut Tree,
    registry: &SchemaRegistry,
    node: NodeId,
    warnings: &mut Vec<LopError>,
) -> Result<Vec<AccessGrant>, LopError> {
    let grants = expand(tree, registry, node, warnings)?;
    for (i, grant) in grants.iter().enumerate() {
        let child = tree.create(node, &format!("access@{}", i))?;
        let target_ph = tree.assign_phandle(grant.target)?;
        tree.set_property(child, "target", PropValue::cell(target_ph))?;
        tree.set_property(child, "flags", PropValue::cell(grant.flags))?;
        if grant.read_only() {
            tree.set_property(child, "read-only", PropValue::Empty)?;
        }
    }
    if !grants.is_empty() {
        tree.remove_property(node, "access")?;
    }
    Ok(grants)
}
