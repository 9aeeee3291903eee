//! Cross-reference resolution inside schema-described properties.
//!
//! Two concerns live here: decoding a compact cell property into records
//! with real node references substituted for phandle cells, and rewriting
//! path-encoded reference properties (such as `include = "/path"`) into
//! numeric phandle references. The rewrite is idempotent: a property that
//! already holds cells is left alone.

use log::warn;

use crate::error::LopError;
use crate::schema::{CellRole, Schema};
use crate::tree::{NodeId, PropValue, Tree};

/// One decoded cell: either a resolved node reference or a raw field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodedCell {
    Node(NodeId),
    Value(u32),
}

/// One repeat-group of a decoded property.
#[derive(Clone, Debug)]
pub struct DecodedRecord {
    cells: Vec<DecodedCell>,
}

impl DecodedRecord {
    /// The node reference at group position `i`, if that cell resolved.
    pub fn node(&self, i: usize) -> Option<NodeId> {
        match self.cells.get(i) {
            Some(DecodedCell::Node(id)) => Some(*id),
            _ => None,
        }
    }

    /// The numeric field at group position `i`.
    pub fn value(&self, i: usize) -> Option<u32> {
        match self.cells.get(i) {
            Some(DecodedCell::Value(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn cells(&self) -> &[DecodedCell] {
        &self.cells
    }
}

/// The result of decoding one property: the records that resolved, plus
/// the per-record errors for those that did not.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    pub records: Vec<DecodedRecord>,
    pub skipped: Vec<LopError>,
}

/// Decode `prop` on `node` according to `schema`.
///
/// The cell sequence is tiled by the schema's group width; a ragged count
/// is a fatal [`LopError::SchemaMismatch`]. Records whose phandle cells
/// name no live node are reported in `skipped` rather than failing the
/// whole decode, so one dangling reference cannot sink the rest of the
/// property.
pub fn decode(
    tree: &Tree,
    node: NodeId,
    prop: &str,
    schema: &Schema,
) -> Result<DecodeOutcome, LopError> {
    let path = tree.path(node)?;
    let value = match tree.node(node)?.property(prop) {
        Some(v) => v,
        None => return Ok(DecodeOutcome::default()),
    };
    let cells = match value {
        PropValue::Cells(c) => c,
        _ => {
            return Err(LopError::PropType {
                path,
                prop: prop.to_string(),
                expected: "a cell list",
            });
        }
    };
    let width = schema.group_width();
    if width == 0 || cells.len() % width != 0 {
        return Err(LopError::SchemaMismatch {
            path,
            prop: prop.to_string(),
            cells: cells.len(),
            width,
        });
    }

    let mut outcome = DecodeOutcome::default();
    'group: for group in cells.chunks(width) {
        let mut decoded = Vec::with_capacity(width);
        for (raw, role) in group.iter().zip(schema.roles()) {
            match role {
                CellRole::Phandle => match tree.node_by_phandle(*raw) {
                    Some(id) => decoded.push(DecodedCell::Node(id)),
                    None => {
                        outcome.skipped.push(LopError::UnresolvedPhandle {
                            phandle: *raw,
                            path: path.clone(),
                            prop: prop.to_string(),
                        });
                        continue 'group;
                    }
                },
                CellRole::Field(_) => decoded.push(DecodedCell::Value(*raw)),
            }
        }
        outcome.records.push(DecodedRecord { cells: decoded });
    }
    Ok(outcome)
}

/// Resolve a node by absolute path, then label, then plain name (first in
/// document order).
pub fn resolve_target(tree: &Tree, spec: &str) -> Result<NodeId, LopError> {
    let found = if spec.starts_with('/') {
        tree.lookup(spec)
    } else {
        tree.lookup_label(spec).or_else(|| tree.lookup_name(spec))
    };
    found.ok_or_else(|| LopError::TargetNotFound {
        target: spec.to_string(),
    })
}

/// Rewrite a path-encoded reference property to a numeric phandle.
///
/// If the property holds a string, the named target is resolved, given a
/// phandle if it lacks one, and the property is replaced with that id.
/// A property already holding cells is left untouched (resolution is
/// idempotent), and the referenced node is returned when the index knows
/// it.
pub fn resolve_reference(
    tree: &mut Tree,
    node: NodeId,
    prop: &str,
) -> Result<Option<NodeId>, LopError> {
    let value = match tree.node(node)?.property(prop) {
        Some(v) => v.clone(),
        None => return Ok(None),
    };
    match value {
        PropValue::Cells(cells) => Ok(cells.first().and_then(|&ph| tree.node_by_phandle(ph))),
        PropValue::Strings(strs) => {
            let spec = match strs.first() {
                Some(s) => s.clone(),
                None => return Ok(None),
            };
            let target = resolve_target(tree, &spec)?;
            let ph = tree.assign_phandle(target)?;
            tree.set_property(node, prop, PropValue::cell(ph))?;
            Ok(Some(target))
        }
        PropValue::Empty => {
            warn!("reference property {} on {} is empty", prop, tree.path(node)?);
            Ok(None)
        }
    }
}
