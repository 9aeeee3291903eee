//! The rule model and the pass executor.
//!
//! A transformation is an ordered list of [`Rule`]s run strictly
//! sequentially against one tree: meta rules register cell grammars,
//! select-and-transform rules hand their match set to a callback, and
//! modify rules apply a single structural or property edit. Later rules
//! observe the mutations of earlier ones, so order is semantics.
//!
//! Callbacks never execute free-form code. A rule inherits a capability
//! tag naming the expander helpers its callback may reach through
//! [`LopContext`]; anything else is [`LopError::CapabilityDenied`].

use bitflags::bitflags;
use log::{debug, warn};

use crate::error::LopError;
use crate::expand;
use crate::schema::{Schema, SchemaRegistry};
use crate::select::Selector;
use crate::tree::{NodeId, PropValue, Tree};

bitflags! {
    /// Capability tag: which expander helper families a rule inherits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Caps: u32 {
        const CPU = 1 << 0;
        const ACCESS = 1 << 1;
        const MEMORY = 1 << 2;
        const FIREWALL = 1 << 3;
        /// Structural normalization helpers (domains, rehoming, includes,
        /// wrapper collapse).
        const STRUCTURE = 1 << 4;
    }
}

/// The transformation step of a select-and-transform rule.
///
/// Invoked once per rule with the ordered selection (possibly empty). The
/// selection is only valid for the duration of the call; node ids must
/// not be retained across rules, since later rules may remove them.
pub trait LopCallback {
    fn exec(&self, ctx: &mut LopContext<'_>, selection: &[NodeId]) -> Result<(), LopError>;
}

impl<F> LopCallback for F
where
    F: Fn(&mut LopContext<'_>, &[NodeId]) -> Result<(), LopError>,
{
    fn exec(&self, ctx: &mut LopContext<'_>, selection: &[NodeId]) -> Result<(), LopError> {
        self(ctx, selection)
    }
}

/// A single structural or property edit, applied by a modify rule.
pub enum ModifyOp {
    /// Set (or add) a property on every matched node.
    SetProp { prop: String, value: PropValue },
    /// Delete a property from every matched node; missing is not an error.
    RemoveProp { prop: String },
    /// Rename the first matched node in place.
    Rename { to: String },
    /// Move the first matched node to an absolute destination path.
    Move { to: String },
    /// Remove every matched node and its subtree.
    Remove,
}

/// One ordered transformation rule.
pub enum Rule {
    /// Register zero or more property schemas.
    Meta { schemas: Vec<Schema> },
    /// Select nodes and hand them to a capability-tagged callback.
    Transform {
        selects: Vec<String>,
        caps: Caps,
        callback: Box<dyn LopCallback>,
        /// Escalate normally-collected errors (unresolved phandles,
        /// missing targets) to fatal for this rule.
        mandatory: bool,
    },
    /// Apply one edit to the nodes matched by a path pattern.
    Modify { pattern: String, op: ModifyOp },
}

impl Rule {
    pub fn meta(schemas: Vec<Schema>) -> Rule {
        Rule::Meta { schemas }
    }

    pub fn transform(
        selects: &[&str],
        caps: Caps,
        callback: impl LopCallback + 'static,
    ) -> Rule {
        Rule::Transform {
            selects: selects.iter().map(|s| s.to_string()).collect(),
            caps,
            callback: Box::new(callback),
            mandatory: false,
        }
    }

    pub fn transform_mandatory(
        selects: &[&str],
        caps: Caps,
        callback: impl LopCallback + 'static,
    ) -> Rule {
        Rule::Transform {
            selects: selects.iter().map(|s| s.to_string()).collect(),
            caps,
            callback: Box::new(callback),
            mandatory: true,
        }
    }

    pub fn modify(pattern: &str, op: ModifyOp) -> Rule {
        Rule::Modify {
            pattern: pattern.to_string(),
            op,
        }
    }
}

/// Per-invocation context handed to a transformation callback.
///
/// Exposes the mutable tree, a lookup-or-fail accessor, the run's schema
/// registry, and the expander helpers gated by the rule's capability tag.
pub struct LopContext<'a> {
    pub tree: &'a mut Tree,
    registry: &'a SchemaRegistry,
    caps: Caps,
    warnings: &'a mut Vec<LopError>,
}

impl<'a> LopContext<'a> {
    /// Look a node up by absolute path, failing with `TargetNotFound`.
    pub fn node_or_fail(&self, path: &str) -> Result<NodeId, LopError> {
        self.tree.lookup(path).ok_or_else(|| LopError::TargetNotFound {
            target: path.to_string(),
        })
    }

    /// The schema registry of this run.
    pub fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    /// Record a non-fatal error into the run report.
    pub fn warn(&mut self, err: LopError) {
        warn!("{}", err);
        self.warnings.push(err);
    }

    fn require(&self, caps: Caps) -> Result<(), LopError> {
        if self.caps.contains(caps) {
            Ok(())
        } else {
            Err(LopError::CapabilityDenied(caps))
        }
    }

    /// Decode and realize the `cpus` grants of a node.
    pub fn expand_cpus(&mut self, node: NodeId) -> Result<Vec<expand::CpuGrant>, LopError> {
        self.require(Caps::CPU)?;
        expand::cpu::apply(self.tree, self.registry, node, self.warnings)
    }

    /// Decode and realize the `access` grants of a node.
    pub fn expand_access(&mut self, node: NodeId) -> Result<Vec<expand::AccessGrant>, LopError> {
        self.require(Caps::ACCESS)?;
        expand::access::apply(self.tree, self.registry, node, self.warnings)
    }

    /// Normalize the `memory` ranges of a node.
    pub fn expand_memory(&mut self, node: NodeId) -> Result<Vec<expand::MemRange>, LopError> {
        self.require(Caps::MEMORY)?;
        expand::memory::apply(self.tree, node)
    }

    /// Decode and realize the `firewallconf` policies of a node.
    pub fn expand_firewall(
        &mut self,
        node: NodeId,
    ) -> Result<Vec<expand::FirewallPolicy>, LopError> {
        self.require(Caps::FIREWALL)?;
        expand::firewall::apply(self.tree, self.registry, node, self.warnings)
    }

    /// Canonicalize id-bearing domain nodes in the selection.
    pub fn normalize_domains(&mut self, selection: &[NodeId]) -> Result<(), LopError> {
        self.require(Caps::STRUCTURE)?;
        expand::domain::normalize_domains(self.tree, selection)
    }

    /// Rehome the selected resource-group containers to `/domains`.
    pub fn rehome_resource_groups(&mut self, selection: &[NodeId]) -> Result<(), LopError> {
        self.require(Caps::STRUCTURE | Caps::MEMORY)?;
        expand::domain::rehome_resource_groups(self.tree, selection)
    }

    /// Rewrite string `include` references to phandles in the selection.
    pub fn resolve_includes(&mut self, selection: &[NodeId]) -> Result<(), LopError> {
        self.require(Caps::STRUCTURE)?;
        expand::domain::resolve_includes(self.tree, selection, self.warnings)
    }

    /// Flatten the selected transparent wrappers.
    pub fn collapse_wrappers(&mut self, selection: &[NodeId]) -> Result<(), LopError> {
        self.require(Caps::STRUCTURE)?;
        expand::domain::collapse_wrappers(self.tree, selection)
    }
}

/// The outcome of a completed pipeline run.
#[derive(Debug, Default)]
pub struct LopReport {
    /// Non-fatal errors collected across all rules, in occurrence order.
    pub warnings: Vec<LopError>,
    /// Number of rules executed.
    pub rules_run: usize,
}

/// The pass executor: runs an ordered rule list against a tree.
pub struct LopRunner {
    rules: Vec<Rule>,
}

impl LopRunner {
    pub fn new(rules: Vec<Rule>) -> LopRunner {
        LopRunner { rules }
    }

    /// Execute every rule in order against `tree`.
    ///
    /// The schema registry is constructed fresh for the run (preloaded
    /// with the stock grammars) so runs stay isolated. Fatal errors abort
    /// immediately, wrapped with the offending rule index; non-fatal
    /// errors accumulate into the report.
    pub fn run(&self, tree: &mut Tree) -> Result<LopReport, LopError> {
        let mut registry = SchemaRegistry::defaults();
        let mut report = LopReport::default();

        for (index, rule) in self.rules.iter().enumerate() {
            match rule {
                Rule::Meta { schemas } => {
                    for schema in schemas {
                        debug!("rule {}: registering schema {}", index, schema.name());
                        registry.register(schema.clone());
                    }
                }
                Rule::Transform {
                    selects,
                    caps,
                    callback,
                    mandatory,
                } => {
                    let pats: Vec<&str> = selects.iter().map(|s| s.as_str()).collect();
                    let selector = Selector::compile(&pats).map_err(|e| e.in_rule(index))?;
                    let selection = selector.evaluate(tree);
                    debug!("rule {}: selected {} node(s)", index, selection.len());
                    let warned = report.warnings.len();
                    let mut ctx = LopContext {
                        tree,
                        registry: &registry,
                        caps: *caps,
                        warnings: &mut report.warnings,
                    };
                    if let Err(e) = callback.exec(&mut ctx, &selection) {
                        if e.is_fatal() || *mandatory {
                            return Err(e.in_rule(index));
                        }
                        warn!("rule {}: {}", index, e);
                        report.warnings.push(e);
                    } else if *mandatory && report.warnings.len() > warned {
                        // A mandatory rule treats collected misses as failures
                        // too, not just errors returned by the callback.
                        let e = report.warnings.remove(warned);
                        return Err(e.in_rule(index));
                    }
                }
                Rule::Modify { pattern, op } => {
                    let selector = Selector::compile(&[pattern.as_str()])
                        .map_err(|e| e.in_rule(index))?;
                    let selection = selector.evaluate(tree);
                    if let Err(e) = apply_modify(tree, &selection, op) {
                        if e.is_fatal() {
                            return Err(e.in_rule(index));
                        }
                        warn!("rule {}: {}", index, e);
                        report.warnings.push(e);
                    }
                }
            }
            report.rules_run += 1;
        }
        Ok(report)
    }
}

fn apply_modify(tree: &mut Tree, selection: &[NodeId], op: &ModifyOp) -> Result<(), LopError> {
    match op {
        ModifyOp::SetProp { prop, value } => {
            for &id in selection {
                tree.set_property(id, prop, value.clone())?;
            }
            Ok(())
        }
        ModifyOp::RemoveProp { prop } => {
            for &id in selection {
                tree.remove_property(id, prop)?;
            }
            Ok(())
        }
        ModifyOp::Rename { to } => match selection.first() {
            Some(&id) => tree.rename(id, to),
            None => Err(LopError::TargetNotFound {
                target: to.clone(),
            }),
        },
        ModifyOp::Move { to } => {
            let id = match selection.first() {
                Some(&id) => id,
                None => {
                    return Err(LopError::TargetNotFound { target: to.clone() });
                }
            };
            let (parent_path, name) = match to.rfind('/') {
                Some(0) => ("/", &to[1..]),
                Some(pos) => (&to[..pos], &to[pos + 1..]),
                None => {
                    return Err(LopError::TargetNotFound { target: to.clone() });
                }
            };
            let parent = tree.lookup(parent_path).ok_or_else(|| LopError::TargetNotFound {
                target: parent_path.to_string(),
            })?;
            tree.reparent(id, parent, Some(name))
        }
        ModifyOp::Remove => {
            for &id in selection {
                match tree.remove(id) {
                    Ok(()) => {}
                    // Already gone with an ancestor matched by the same pattern.
                    Err(LopError::StaleNode(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
    }
}

/// The canonical boot-time derivation pipeline.
///
/// Mirrors the declared order of the standard rule file: domains are
/// canonicalized first, resource groups rehomed, includes resolved, then
/// wrappers flattened and the compact grant properties expanded.
pub fn standard_lops() -> Vec<Rule> {
    vec![
        Rule::meta(vec![
            Schema::parse("cpus", "phandle mask mode"),
            Schema::parse("access", "phandle flags"),
            Schema::parse("firewallconf", "phandle type priority"),
        ]),
        Rule::transform(
            &["/domains/.*:id"],
            Caps::STRUCTURE,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| ctx.normalize_domains(sel),
        ),
        Rule::transform(
            &["/domains(/.*)?/resource_groups"],
            Caps::STRUCTURE | Caps::MEMORY,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| ctx.rehome_resource_groups(sel),
        ),
        Rule::transform(
            &["/.*:include"],
            Caps::STRUCTURE,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| ctx.resolve_includes(sel),
        ),
        Rule::transform(
            &["/domains/.*:!compatible"],
            Caps::STRUCTURE,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| ctx.collapse_wrappers(sel),
        ),
        Rule::transform(
            &["/domains/.*:cpus"],
            Caps::CPU,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| {
                for &id in sel {
                    ctx.expand_cpus(id)?;
                }
                Ok(())
            },
        ),
        Rule::transform(
            &["/domains/.*:access"],
            Caps::ACCESS,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| {
                for &id in sel {
                    ctx.expand_access(id)?;
                }
                Ok(())
            },
        ),
        Rule::transform(
            &["/domains/.*:memory"],
            Caps::MEMORY,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| {
                for &id in sel {
                    ctx.expand_memory(id)?;
                }
                Ok(())
            },
        ),
        Rule::transform(
            &["/domains/.*:firewallconf"],
            Caps::FIREWALL,
            |ctx: &mut LopContext<'_>, sel: &[NodeId]| {
                for &id in sel {
                    ctx.expand_firewall(id)?;
                }
                Ok(())
            },
        ),
    ]
}
