//! Expansion of `firewallconf` policies.
//!
//! A `firewallconf` property is a repeat group of `(phandle, type,
//! priority)` tuples: the phandle names the firewall controller guarding a
//! resource, the type selects the policy, and the priority orders
//! competing policies.

use crate::error::LopError;
use crate::phandle;
use crate::schema::{Schema, SchemaRegistry};
use crate::tree::{NodeId, PropValue, Tree};

/// A firewall policy type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FirewallAction {
    Allow,
    Block,
    /// Block unless another domain legitimately claims the resource.
    BlockDesirable,
    /// A type value this engine does not interpret; carried through.
    Other(u32),
}

impl FirewallAction {
    pub fn from_raw(raw: u32) -> FirewallAction {
        match raw {
            0 => FirewallAction::Allow,
            1 => FirewallAction::Block,
            2 => FirewallAction::BlockDesirable,
            other => FirewallAction::Other(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            FirewallAction::Allow => 0,
            FirewallAction::Block => 1,
            FirewallAction::BlockDesirable => 2,
            FirewallAction::Other(v) => v,
        }
    }
}

/// One realized firewall policy record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirewallPolicy {
    /// The firewall controller node.
    pub controller: NodeId,
    pub action: FirewallAction,
    pub priority: u32,
}

fn schema_of(registry: &SchemaRegistry) -> Schema {
    registry
        .get("firewallconf")
        .cloned()
        .unwrap_or_else(|| Schema::parse("firewallconf", "phandle type priority"))
}

/// Decode the `firewallconf` property of `node`. Unresolved controllers
/// are appended to `warnings` and skipped.
pub fn expand(
    tree: &Tree,
    registry: &SchemaRegistry,
    node: NodeId,
    warnings: &mut Vec<LopError>,
) -> Result<Vec<FirewallPolicy>, LopError> {
    let schema = schema_of(registry);
    let outcome = phandle::decode(tree, node, "firewallconf", &schema)?;
    warnings.extend(outcome.skipped);

    let mut policies = Vec::with_capacity(outcome.records.len());
    for rec in &outcome.records {
        let (controller, ftype, priority) = match (rec.node(0), rec.value(1), rec.value(2)) {
            (Some(c), Some(t), Some(p)) => (c, t, p),
            _ => {
                return Err(LopError::SchemaMismatch {
                    path: tree.path(node)?,
                    prop: "firewallconf".to_string(),
                    cells: rec.cells().len(),
                    width: 3,
                });
            }
        };
        policies.push(FirewallPolicy {
            controller,
            action: FirewallAction::from_raw(ftype),
            priority,
        });
    }
    Ok(policies)
}

/// Expand and rewrite: the compact `firewallconf` property is replaced by
/// one `firewall@N` child per policy.
pub fn apply(
    tree: &mut Tree,
    registry: &SchemaRegistry,
    node: NodeId,
    warnings: &mut Vec<LopError>,
) -> Result<Vec<FirewallPolicy>, LopError> {
    let policies = expand(tree, registry, node, warnings)?;
    for (i, policy) in policies.iter().enumerate() {
        let child = tree.create(node, &format!("firewall@{}", i))?;
        let ph = tree.assign_phandle(policy.controller)?;
        tree.set_property(child, "controller", PropValue::cell(ph))?;
        tree.set_property(child, "type", PropValue::cell(policy.action.raw()))?;
        tree.set_property(child, "priority", PropValue::cell(policy.priority))?;
    }
    if !policies.is_empty() {
        tree.remove_property(node, "firewallconf")?;
    }
    Ok(policies)
}
