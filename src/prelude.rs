//! Module exporting the commonly used types of this library.

pub use crate::error::LopError;
pub use crate::expand::{
    AccessFlags, AccessGrant, CpuGrant, ExecMode, FirewallAction, FirewallPolicy, MemRange,
};
pub use crate::lops::{
    standard_lops, Caps, LopCallback, LopContext, LopReport, LopRunner, ModifyOp, Rule,
};
pub use crate::phandle::{DecodeOutcome, DecodedCell, DecodedRecord};
pub use crate::schema::{CellRole, Schema, SchemaRegistry};
pub use crate::select::Selector;
pub use crate::tree::{Node, NodeId, Prop, PropValue, Tree};
