//! Normalization of `memory` range properties.
//!
//! A `memory` property is a repeat group of `(base, size)` pairs, with an
//! optional leading phandle naming the memory node the ranges carve from.
//! Sources are sloppy about encoding: sizes may arrive as strings with
//! `K`/`M`/`G` unit suffixes, and ranges may overlap. Expansion produces
//! sorted, merged, canonical numeric ranges and rewrites the property in
//! place.

use crate::error::LopError;
use crate::tree::{NodeId, PropValue, Tree};

/// One canonical memory range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRange {
    pub base: u64,
    pub size: u64,
}

impl MemRange {
    fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }
}

/// Parse a numeric value with an optional binary unit suffix:
/// `0x1000`, `4096`, `4K`, `16M`, `1G`.
pub fn parse_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    let (body, shift) = match raw.as_bytes().last()? {
        b'K' | b'k' => (&raw[..raw.len() - 1], 10),
        b'M' | b'm' => (&raw[..raw.len() - 1], 20),
        b'G' | b'g' => (&raw[..raw.len() - 1], 30),
        _ => (raw, 0),
    };
    body.trim().parse::<u64>().ok().map(|v| v << shift)
}

fn mismatch(path: &str, cells: usize) -> LopError {
    LopError::SchemaMismatch {
        path: path.to_string(),
        prop: "memory".to_string(),
        cells,
        width: 2,
    }
}

/// Decode and canonicalize the `memory` property of `node`.
///
/// Returns the optional referenced memory node plus the merged ranges.
/// A pair count that does not tile by two (after peeling a leading
/// phandle, if one resolves) is a fatal [`LopError::SchemaMismatch`].
pub fn expand(tree: &Tree, node: NodeId) -> Result<(Option<NodeId>, Vec<MemRange>), LopError> {
    let path = tree.path(node)?;
    let value = match tree.node(node)?.property("memory") {
        Some(v) => v.clone(),
        None => return Ok((None, Vec::new())),
    };

    let mut origin = None;
    let raw: Vec<u64> = match value {
        PropValue::Cells(cells) => {
            let mut vals: Vec<u64> = cells.iter().map(|&c| u64::from(c)).collect();
            if vals.len() % 2 == 1 {
                // An odd cell count is only legal when the first cell is a
                // resolvable node reference.
                match cells.first().and_then(|&ph| tree.node_by_phandle(ph)) {
                    Some(id) => {
                        origin = Some(id);
                        vals.remove(0);
                    }
                    None => return Err(mismatch(&path, cells.len())),
                }
            }
            vals
        }
        PropValue::Strings(strs) => {
            let mut vals = Vec::with_capacity(strs.len());
            for s in &strs {
                match parse_size(s) {
                    Some(v) => vals.push(v),
                    None => {
                        return Err(LopError::PropType {
                            path,
                            prop: "memory".to_string(),
                            expected: "numeric values with optional K/M/G suffix",
                        });
                    }
                }
            }
            if vals.len() % 2 == 1 {
                return Err(mismatch(&path, strs.len()));
            }
            vals
        }
        PropValue::Empty => Vec::new(),
    };

    let mut ranges: Vec<MemRange> = raw
        .chunks(2)
        .map(|pair| MemRange {
            base: pair[0],
            size: pair[1],
        })
        .collect();
    ranges.sort_by_key(|r| r.base);

    // Merge overlapping ranges into canonical non-overlapping ones.
    let mut merged: Vec<MemRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match merged.last_mut() {
            Some(prev) if r.base < prev.end() => {
                let end = prev.end().max(r.end());
                prev.size = end - prev.base;
            }
            _ => merged.push(r),
        }
    }
    Ok((origin, merged))
}

/// Expand and rewrite the `memory` property to canonical numeric cells,
/// preserving any leading node reference.
pub fn apply(tree: &mut Tree, node: NodeId) -> Result<Vec<MemRange>, LopError> {
    let (origin, ranges) = expand(tree, node)?;
    if ranges.is_empty() && origin.is_none() {
        return Ok(ranges);
    }
    let mut cells = Vec::with_capacity(ranges.len() * 2 + 1);
    if let Some(id) = origin {
        cells.push(tree.assign_phandle(id)?);
    }
    for r in &ranges {
        for v in &[r.base, r.size] {
            if *v > u64::from(u32::MAX) {
                return Err(LopError::PropType {
                    path: tree.path(node)?,
                    prop: "memory".to_string(),
                    expected: "ranges that fit 32-bit cells",
                });
            }
            cells.push(*v as u32);
        }
    }
    tree.set_property(node, "memory", PropValue::Cells(cells))?;
    Ok(ranges)
}
