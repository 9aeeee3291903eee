use thiserror::Error;

use crate::lops::Caps;

/// Errors raised while loading or executing lop operations against a
/// system device tree.
///
/// Only a subset of these abort a pipeline run; the rest are collected into
/// the run report so a single bad reference does not sink an otherwise
/// valid transformation. See [`LopError::is_fatal`].
#[derive(Debug, Error)]
pub enum LopError {
    /// A selection pattern could not be compiled.
    #[error("malformed selection pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    /// A property referenced a phandle with no corresponding node.
    #[error("unresolved phandle {phandle} referenced by {path}:{prop}")]
    UnresolvedPhandle {
        phandle: u32,
        path: String,
        prop: String,
    },

    /// A property's cell count does not tile by its schema's group width.
    #[error("schema mismatch on {path}:{prop}: {cells} cells is not a multiple of group width {width}")]
    SchemaMismatch {
        path: String,
        prop: String,
        cells: usize,
        width: usize,
    },

    /// A reparent would have made a node its own ancestor.
    #[error("cannot reparent {path} beneath its own descendant {dest}")]
    Cycle { path: String, dest: String },

    /// A path, label, or name lookup missed.
    #[error("target `{target}` not found")]
    TargetNotFound { target: String },

    /// A create, rename, or move collided with an existing sibling.
    #[error("node {path} already exists")]
    NodeExists { path: String },

    /// An explicit phandle assignment collided with an indexed one.
    #[error("phandle {0} is already assigned")]
    PhandleInUse(u32),

    /// A property held a value of the wrong shape for the operation.
    #[error("property `{prop}` on {path} is not {expected}")]
    PropType {
        path: String,
        prop: String,
        expected: &'static str,
    },

    /// A callback invoked a helper its rule did not inherit.
    #[error("callback requires capability {0:?} which the rule does not inherit")]
    CapabilityDenied(Caps),

    /// A node id was used after the node it named was removed.
    #[error("node id {0} refers to a removed node")]
    StaleNode(u32),

    /// A structural operation targeted the root node.
    #[error("the root node cannot be {0}")]
    RootImmutable(&'static str),

    /// Context wrapper recording which rule a fatal error surfaced in.
    #[error("rule {index}: {source}")]
    Rule {
        index: usize,
        #[source]
        source: Box<LopError>,
    },
}

impl LopError {
    /// Whether this error aborts the whole pipeline.
    ///
    /// `UnresolvedPhandle` and `TargetNotFound` are logged and collected
    /// into the run report; everything else is a hard stop.
    pub fn is_fatal(&self) -> bool {
        match self {
            LopError::UnresolvedPhandle { .. } | LopError::TargetNotFound { .. } => false,
            LopError::Rule { source, .. } => source.is_fatal(),
            _ => true,
        }
    }

    pub(crate) fn in_rule(self, index: usize) -> LopError {
        LopError::Rule {
            index,
            source: Box::new(self),
        }
    }
}
