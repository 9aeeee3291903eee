//! Subsystem expanders: domain-specific passes that turn compact,
//! schema-encoded relationship properties into fully realized subsystem
//! descriptors, plus the structural normalization passes that flatten and
//! canonicalize the domains subtree.

pub mod access;
pub mod cpu;
pub mod domain;
pub mod firewall;
pub mod memory;

pub use access::{AccessFlags, AccessGrant};
pub use cpu::{CpuGrant, ExecMode};
pub use firewall::{FirewallAction, FirewallPolicy};
pub use memory::MemRange;
