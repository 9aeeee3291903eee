//! A rule driven transformation engine for system device trees.
//!
//! Takes a generic, fully populated device tree and an ordered list of
//! declarative "lop" (list-of-processing) rules, and derives per-subsystem
//! boot-time device descriptions from it: selecting nodes by path and
//! property patterns, resolving phandle cross-references, restructuring
//! the tree, and expanding compact relationship properties (`cpus`,
//! `access`, `memory`, `firewallconf`) into fully realized subsystem
//! descriptors.
//!
//! Includes the following pieces:
//!
//! * [An owned, index-consistent node store](tree)
//! * [Pattern-based node selection](select)
//! * [Schema-driven phandle decoding and rewriting](phandle)
//! * [The rule model and sequential pass executor](lops)
//! * [Subsystem expanders and structural normalization](expand)
//!
//! Parsing and serializing the textual or flattened tree formats is out of
//! scope; trees are built and consumed through the [`tree::Tree`] API by
//! external collaborators.
//!
//! # Example
//!
//! Rehoming a reusable resource group into the flat domain list:
//!
//! ```
//! use fdt_lop::prelude::*;
//!
//! let mut tree = Tree::new();
//! let root = tree.root();
//! let domains = tree.create(root, "domains")?;
//! let groups = tree.create(domains, "resource_groups")?;
//! let rg0 = tree.create(groups, "rg0")?;
//! tree.set_property(
//!     rg0,
//!     "memory",
//!     PropValue::Strings(vec!["0xa0000000".to_string(), "4K".to_string()]),
//! )?;
//!
//! let report = LopRunner::new(standard_lops()).run(&mut tree)?;
//! assert!(report.warnings.is_empty());
//!
//! let rg = tree.lookup("/domains/resourcegroup@0").expect("rehomed group");
//! assert_eq!(tree.node(rg)?.label(), Some("rg0"));
//! assert!(tree.lookup("/domains/resource_groups").is_none());
//! # Ok::<(), fdt_lop::LopError>(())
//! ```

#![deny(clippy::all)]

#[macro_use]
extern crate static_assertions;

pub mod error;
pub mod expand;
pub mod lops;
pub mod phandle;
pub mod schema;
pub mod select;
pub mod tree;

pub mod prelude;

pub use error::LopError;
pub use tree::Tree;
