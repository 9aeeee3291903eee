//! Structural normalization of the domains subtree.
//!
//! These passes run over rule selections and make downstream consumers
//! independent of source naming and nesting: id-bearing nodes become
//! canonically named domains, reusable resource groups are rehomed to
//! top-level scope, string includes become phandle references, and
//! transparent grouping wrappers are flattened away.

use log::{debug, warn};

use crate::error::LopError;
use crate::expand::memory;
use crate::phandle;
use crate::tree::{NodeId, PropValue, Tree};

/// Canonical compatible tag stamped on normalized domains.
pub const DOMAIN_COMPAT: &str = "openamp,domain-v1";

/// Canonical compatible tags stamped on rehomed resource groups.
pub const GROUP_COMPATS: [&str; 2] = ["openamp,remoteproc-v1", "openamp,group-v1"];

/// Canonicalize id-bearing domain nodes.
///
/// Each selected node keeps its identity under a new index-based name
/// (`domain@0`, `domain@1`, ... in first-seen order): the original name
/// moves to the label and `compatible` is set to the canonical domain tag.
/// Nodes already carrying the tag are left alone, so repeated runs keep
/// the preserved labels.
pub fn normalize_domains(tree: &mut Tree, selection: &[NodeId]) -> Result<(), LopError> {
    let mut index = 0;
    for &id in selection {
        let node = tree.node(id)?;
        if !node.has_property("id") {
            continue;
        }
        if node.property("compatible").and_then(|v| v.first_string()) == Some(DOMAIN_COMPAT) {
            // Already canonical from an earlier run; keep its name and
            // label, but let it claim its slot in the numbering.
            index += 1;
            continue;
        }
        let original = tree.node(id)?.name().to_string();
        debug!("normalizing domain {} -> domain@{}", original, index);
        tree.set_label(id, Some(&original))?;
        tree.set_property(id, "compatible", PropValue::string(DOMAIN_COMPAT))?;
        tree.rename(id, &format!("domain@{}", index))?;
        index += 1;
    }
    Ok(())
}

/// Rehome resource-group containers.
///
/// Every child of each selected container is deep-cloned to
/// `/domains/resourcegroup@N` (first-seen order), labeled with its
/// original name, stamped with the group compatible tags, and has its
/// memory ranges normalized. The containers and their children are then
/// removed.
pub fn rehome_resource_groups(tree: &mut Tree, selection: &[NodeId]) -> Result<(), LopError> {
    let domains = match tree.lookup("/domains") {
        Some(id) => id,
        None => {
            let root = tree.root();
            tree.create(root, "domains")?
        }
    };
    let mut index = 0;
    for &container in selection {
        let groups: Vec<NodeId> = tree.node(container)?.children().to_vec();
        for group in groups {
            let original = tree.node(group)?.name().to_string();
            let copy = tree.duplicate(group, domains, &format!("resourcegroup@{}", index))?;
            index += 1;
            tree.set_label(copy, Some(&original))?;
            tree.set_property(
                copy,
                "compatible",
                PropValue::Strings(GROUP_COMPATS.iter().map(|s| s.to_string()).collect()),
            )?;
            memory::apply(tree, copy)?;
            debug!("rehomed resource group {} -> {}", original, tree.path(copy)?);
        }
        tree.remove(container)?;
    }
    Ok(())
}

/// Resolve string `include` references into numeric phandles.
///
/// Misses are logged and collected as warnings; already-numeric includes
/// are no-ops, so the pass is idempotent.
pub fn resolve_includes(
    tree: &mut Tree,
    selection: &[NodeId],
    warnings: &mut Vec<LopError>,
) -> Result<(), LopError> {
    for &id in selection {
        match phandle::resolve_reference(tree, id, "include") {
            Ok(_) => {}
            Err(e @ LopError::TargetNotFound { .. }) => {
                warn!("{} (include on {}), skipping", e, tree.path(id)?);
                warnings.push(e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Collapse transparent grouping wrappers.
///
/// A selected wrapper (a `compatible`-less node under a domains path) has
/// its children reparented onto its own parent in order, then is removed.
/// Nodes already consumed by an earlier wrapper in the same selection are
/// skipped.
pub fn collapse_wrappers(tree: &mut Tree, selection: &[NodeId]) -> Result<(), LopError> {
    for &id in selection {
        let node = match tree.node(id) {
            Ok(n) => n,
            // Already removed earlier in this pass.
            Err(LopError::StaleNode(_)) => continue,
            Err(e) => return Err(e),
        };
        if node.has_property("compatible") {
            continue;
        }
        let parent = match node.parent() {
            Some(p) => p,
            None => continue,
        };
        let children: Vec<NodeId> = node.children().to_vec();
        for child in children {
            tree.reparent(child, parent, None)?;
        }
        debug!("collapsing wrapper {}", tree.path(id)?);
        tree.remove(id)?;
    }
    Ok(())
}
