//! Per-property cell grammars and their registry.
//!
//! Compact relationship properties (`cpus`, `access`, `address-map`, ...)
//! encode tuples of cells. A [`Schema`] names the role of each cell in one
//! tuple; the tuple repeats to fill the property. Grammars are declared by
//! "meta" rules from descriptor strings such as `"phandle mask mode"`,
//! where the token `phandle` marks a cross-reference cell and any other
//! token names a numeric field.

use std::collections::HashMap;

/// The role of a single cell within a schema's repeat group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellRole {
    /// The cell holds a phandle naming another node.
    Phandle,
    /// The cell holds an opaque numeric field with the given name.
    Field(String),
}

/// A named cell grammar for one property.
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    roles: Vec<CellRole>,
}

impl Schema {
    /// Build a schema from an explicit role list.
    pub fn new(name: &str, roles: Vec<CellRole>) -> Schema {
        Schema {
            name: name.to_string(),
            roles,
        }
    }

    /// Parse a whitespace-separated descriptor, e.g. `"phandle mask mode"`.
    pub fn parse(name: &str, descriptor: &str) -> Schema {
        let roles = descriptor
            .split_whitespace()
            .map(|tok| {
                if tok == "phandle" {
                    CellRole::Phandle
                } else {
                    CellRole::Field(tok.to_string())
                }
            })
            .collect();
        Schema::new(name, roles)
    }

    /// The property name this schema decodes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell roles of one repeat group.
    pub fn roles(&self) -> &[CellRole] {
        &self.roles
    }

    /// Cells consumed per repeat group.
    pub fn group_width(&self) -> usize {
        self.roles.len()
    }
}

/// All schemas known to one pipeline run.
///
/// Built fresh per run so runs stay isolated; meta rules may override the
/// defaults at any point and later rules observe the replacement.
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> SchemaRegistry {
        SchemaRegistry {
            schemas: HashMap::new(),
        }
    }

    /// A registry preloaded with the stock grammars for the well-known
    /// relationship properties.
    pub fn defaults() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        for (name, desc) in &[
            ("cpus", "phandle mask mode"),
            ("access", "phandle flags"),
            ("include", "phandle"),
            ("memory", "base size"),
            ("firewallconf", "phandle type priority"),
            ("interrupt-parent", "phandle"),
            ("interrupt-map", "icells phandle parent-icells"),
            ("address-map", "address phandle parent-address size"),
        ] {
            reg.register(Schema::parse(name, desc));
        }
        reg
    }

    /// Register (or replace) a schema under its property name.
    pub fn register(&mut self, schema: Schema) {
        self.schemas.insert(schema.name().to_string(), schema);
    }

    /// The schema for a property name, if declared.
    pub fn get(&self, prop_name: &str) -> Option<&Schema> {
        self.schemas.get(prop_name)
    }
}

impl Default for SchemaRegistry {
    fn default() -> SchemaRegistry {
        SchemaRegistry::new()
    }
}
